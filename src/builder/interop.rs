//! Building libraries that call into C.
//!
//! The interop sources are copied into a scratch directory, run through
//! `go tool cgo`, and the generated C and Go halves are compiled
//! separately and packed into one archive together with the directory's
//! own C files. The scratch directory is removed whatever the outcome.

use std::fs;
use std::path::{Path, PathBuf};

use crate::builder::toolchain::{ArchiveInput, CompileInput, GoToolchain, LeafError, Toolchain};
use crate::core::platform::Platform;
use crate::util::fs::remove_dir_all_if_exists;
use crate::util::process::ProcessBuilder;

/// Scratch directory inside the target directory.
pub const WORK_DIR: &str = "_cgo";

/// Everything needed to build one interop library.
#[derive(Debug, Clone)]
pub struct InteropInput {
    /// Absolute target directory
    pub dir: PathBuf,
    /// Import path of the library
    pub import_path: String,
    /// Declared package name
    pub package: String,
    /// Plain Go sources
    pub go_sources: Vec<String>,
    /// Go sources importing the interop pseudo-package
    pub interop_sources: Vec<String>,
    pub c_sources: Vec<String>,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    pub gcflags: Vec<String>,
    /// Archive to produce
    pub output: PathBuf,
}

/// Word-size flag for the C compiler.
pub fn arch_cflags(platform: &Platform) -> Vec<String> {
    match platform.arch() {
        "amd64" | "arm64" => vec!["-m64".into()],
        "386" => vec!["-m32".into()],
        _ => Vec::new(),
    }
}

/// Flags for linking the throwaway object cgo reads dynamic imports from.
pub fn os_ldflags(platform: &Platform) -> Vec<String> {
    let flags: &[&str] = match platform.os() {
        "linux" | "freebsd" | "openbsd" => &["-shared", "-lpthread", "-lm"],
        "darwin" => &["-dynamiclib", "-Wl,-undefined,dynamic_lookup"],
        "windows" => &["-shared", "-lm", "-mthreads"],
        _ => &[],
    };
    flags.iter().map(|f| f.to_string()).collect()
}

pub(crate) fn build(tc: &GoToolchain, input: &InteropInput) -> Result<(), LeafError> {
    let work = input.dir.join(WORK_DIR);
    fs::create_dir_all(&work).map_err(|e| LeafError::io("create directory", &work, e))?;

    let result = build_in(tc, input, &work);
    if let Err(e) = remove_dir_all_if_exists(&work) {
        tracing::warn!("{:#}", e);
    }
    result
}

fn build_in(tc: &GoToolchain, input: &InteropInput, work: &Path) -> Result<(), LeafError> {
    for src in &input.interop_sources {
        let from = input.dir.join(src);
        fs::copy(&from, work.join(src)).map_err(|e| LeafError::io("copy", &from, e))?;
    }

    let cgo = tc
        .go_tool("cgo", work)?
        .args(["-objdir", "."])
        .args(["-importpath", input.import_path.as_str()])
        .arg("--")
        .arg(format!("-I{}", input.dir.display()))
        .args(&input.cflags)
        .args(&input.interop_sources);
    tc.run(cgo)?;

    let (generated_go, generated_c) = generated_sources(work)?;

    let arch = arch_cflags(&tc.platform);
    let mut c_objects = Vec::new();
    let c_inputs = generated_c
        .iter()
        .map(|f| work.join(f))
        .chain(input.c_sources.iter().map(|f| input.dir.join(f)));
    for src in c_inputs {
        let object = work.join(object_name(&src));
        let cmd = ProcessBuilder::new(tc.gcc()?)
            .args(&arch)
            .args(["-g", "-fPIC", "-O2"])
            .arg(format!("-I{}", input.dir.display()))
            .arg(format!("-I{}", work.display()))
            .args(&input.cflags)
            .arg("-o")
            .arg(&object)
            .arg("-c")
            .arg(&src)
            .cwd(work);
        tc.run(cmd)?;
        c_objects.push(object);
    }

    // The dynamic-import table is read back from a fully linked object.
    let main_object = work.join("_cgo_main.o");
    let dyn_object = work.join("_cgo_.o");
    let cmd = ProcessBuilder::new(tc.gcc()?)
        .args(&arch)
        .arg("-o")
        .arg(&dyn_object)
        .arg(&main_object)
        .args(c_objects.iter().filter(|o| **o != main_object))
        .args(os_ldflags(&tc.platform))
        .args(&input.ldflags)
        .cwd(work);
    tc.run(cmd)?;

    let dynimport = tc
        .go_tool("cgo", work)?
        .args(["-dynpackage", input.package.as_str()])
        .arg("-dynimport")
        .arg(&dyn_object)
        .args(["-dynout", "_cgo_import.go"]);
    tc.run(dynimport)?;

    let go_object = work.join("_go_.o");
    let mut sources: Vec<PathBuf> = input.go_sources.iter().map(|f| input.dir.join(f)).collect();
    sources.extend(generated_go.iter().map(|f| work.join(f)));
    sources.push(work.join("_cgo_import.go"));
    tc.compile(&CompileInput {
        dir: work.to_path_buf(),
        import_path: input.import_path.clone(),
        sources,
        output: go_object.clone(),
        include_dirs: input.include_dirs.clone(),
        gcflags: input.gcflags.clone(),
    })?;

    let mut objects = vec![go_object];
    objects.extend(c_objects.into_iter().filter(|o| *o != main_object));
    tc.archive(&ArchiveInput {
        dir: work.to_path_buf(),
        objects,
        output: input.output.clone(),
    })
}

/// Go and C files cgo generated in `work`, sorted.
fn generated_sources(work: &Path) -> Result<(Vec<String>, Vec<String>), LeafError> {
    let entries = fs::read_dir(work).map_err(|e| LeafError::io("read directory", work, e))?;
    let mut go = Vec::new();
    let mut c = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".cgo1.go") || name == "_cgo_gotypes.go" {
            go.push(name);
        } else if name.ends_with(".cgo2.c") || name == "_cgo_export.c" || name == "_cgo_main.c" {
            c.push(name);
        }
    }
    go.sort();
    c.sort();
    Ok((go, c))
}

fn object_name(src: &Path) -> String {
    let stem = src
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}.o")
}
