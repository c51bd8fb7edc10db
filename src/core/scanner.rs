//! Recursive discovery of targets under a root directory.

use std::fs;
use std::path::Path;

use crate::core::dir_config::{keys, read_one_liner, DirConfig, TARGET_FILE};
use crate::core::registry::Registry;
use crate::core::report::Report;
use crate::core::target::{ScanSettings, Site, Target, TargetError};
use crate::util::context::GlobalContext;
use crate::util::fs::{base_name, clean_path, is_inside, relative_path, slash_path};

/// Directory names that hold build output, never sources.
const OUTPUT_DIRS: &[&str] = &["_obj", "_test", "_cgo", "bin"];

/// Name of directories holding test fixtures.
pub const TESTDATA_DIR: &str = "testdata";

/// Walks directory trees and registers every target it finds.
pub struct Scanner<'a> {
    ctx: &'a GlobalContext,
    settings: &'a ScanSettings,
    report: &'a Report,
}

impl<'a> Scanner<'a> {
    pub fn new(ctx: &'a GlobalContext, settings: &'a ScanSettings, report: &'a Report) -> Self {
        Scanner {
            ctx,
            settings,
            report,
        }
    }

    /// Scan the working root.
    pub fn scan_root(&self, registry: &mut Registry) {
        self.scan(registry, ".", Path::new("."), None);
    }

    /// Scan the standard-library tree and every external root.
    pub fn scan_toolchain_roots(&self, registry: &mut Registry) {
        let env = self.ctx.env();
        self.scan(registry, "", &env.stdlib_src(), None);
        for gp in env.gopaths() {
            self.scan(registry, "", &gp.join("src"), None);
        }
    }

    fn scan(&self, registry: &mut Registry, base: &str, dir: &Path, testdata: Option<&Path>) {
        let dir_name = base_name(dir);
        if OUTPUT_DIRS.contains(&dir_name.as_str())
            || (dir_name != "." && dir_name.starts_with('.'))
        {
            return;
        }

        let abs_dir = clean_path(&self.ctx.cwd().join(dir));

        // Fixture trees only count when gb runs from inside them.
        let mut testdata = testdata.map(Path::to_path_buf);
        if dir_name == TESTDATA_DIR {
            if !is_inside(self.ctx.oswd(), &abs_dir) {
                return;
            }
            testdata = Some(dir.to_path_buf());
        }

        let mut cfg = DirConfig::read(&abs_dir);
        if self.settings.write_workspace {
            let rel = slash_path(&relative_path(&abs_dir, self.ctx.cwd()));
            cfg.set(keys::WORKSPACE, if rel.is_empty() { ".".to_string() } else { rel });
            if let Err(e) = cfg.write(&abs_dir) {
                tracing::warn!("{:#}", e);
            }
        }

        let mut child_base = base.to_string();
        if cfg.ignore() {
            tracing::info!("{} ignored", dir.display());
        } else {
            let site = Site {
                base,
                dir,
                testdata: testdata.as_deref(),
                config: &cfg,
            };
            match Target::new(self.ctx, self.settings, site, self.report) {
                Ok(target) => {
                    child_base = target.base.clone();
                    registry.register(target);
                }
                Err(err) => {
                    match &err {
                        TargetError::NoSourceFiles
                        | TargetError::OptOut
                        | TargetError::PlatformFiltered(_)
                        | TargetError::StdlibWithoutBuildScript => {
                            tracing::debug!("(in {}) {}", dir.display(), err)
                        }
                        _ => tracing::warn!("(in {}) {}", dir.display(), err),
                    }
                    if let Some(legacy) = read_one_liner(&abs_dir.join(TARGET_FILE)) {
                        child_base = legacy;
                    }
                }
            }
        }

        if cfg.ignore_all() {
            return;
        }
        for sub in subdirs(&abs_dir) {
            let child_dir = clean_path(&dir.join(&sub));
            self.scan(registry, &join_base(&child_base, &sub), &child_dir, testdata.as_deref());
        }
    }
}

/// `base/sub`, where an empty or `.` base contributes nothing.
fn join_base(base: &str, sub: &str) -> String {
    if base.is_empty() || base == "." {
        sub.to_string()
    } else {
        format!("{base}/{sub}")
    }
}

/// Immediate subdirectory names, sorted. Symlinks are not followed.
fn subdirs(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(e) => {
            tracing::debug!("cannot read {}: {}", dir.display(), e);
            Vec::new()
        }
    };
    names.sort();
    names
}
