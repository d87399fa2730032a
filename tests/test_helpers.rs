// ==========================================
// Shared helpers for integration tests
// ==========================================

#![allow(dead_code)]

use pv_pan_tool::{IngestConfig, PvPanTool};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A bifacial module file with five monotonic non-negative IV points.
pub const BIFACIAL_PAN: &str = "\
Manufacturer = Jinko Solar
Model = Tiger Neo 72HL4
PNom = 550
Voc = 49.9
Isc = 13.9
Vmp = 41.96
Imp = 13.11
Technol = mtSiMono
Width = 1.134
Height = 2.278
Weight = 28.0
Bifaciality = 70%
IVCurve_STC
0.0, 13.9
10.0, 13.8
20.0, 13.5
30.0, 12.9
41.96, 13.11
End of IVCurve
";

/// A plain mono module without bifaciality or curves.
pub const MONO_PAN: &str = "\
Manufacturer = Longi
Model = Hi-MO 5
PNom = 500
Voc = 45.2
Isc = 13.2
Technol = mtSiMono
Width = 1.096
Height = 2.256
Weight = 26.5
";

/// A poly module with lower power, no bifaciality.
pub const POLY_PAN: &str = "\
Manufacturer = Trina
Model = Vertex Poly
PNom = 440
Voc = 41.0
Isc = 12.1
Technol = mtSiPoly
Width = 1.050
Height = 2.100
";

/// A file whose only curve block has three points (below the minimum).
pub const SHORT_CURVE_PAN: &str = "\
Manufacturer = Risen
Model = Titan S
PNom = 410
Bifaciality = 65%
IVCurve_STC
0.0, 10.0
5.0, 9.8
10.0, 9.1
End of IVCurve
";

/// Structurally empty: nothing tokenizes to a pair or block.
pub const GARBAGE_PAN: &str = "???\n###\n!!!\n";

pub struct TestEnv {
    pub dir: TempDir,
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let db_path = dir.path().join("pv_modules.db");
        let data_dir = dir.path().join("pan_files");
        fs::create_dir_all(&data_dir).expect("create data dir");
        Self {
            dir,
            db_path,
            data_dir,
        }
    }

    /// Write a fixture under the scan root, creating parent folders.
    pub fn write_pan(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.data_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dirs");
        }
        fs::write(&path, content).expect("write fixture");
        path
    }

    pub fn open_tool(&self) -> PvPanTool {
        PvPanTool::with_defaults(self.db_path.to_str().expect("utf-8 db path"))
            .expect("open pv-pan-tool")
    }

    pub fn open_tool_with(&self, config: IngestConfig) -> PvPanTool {
        PvPanTool::new(self.db_path.to_str().expect("utf-8 db path"), config)
            .expect("open pv-pan-tool")
    }
}

/// Convenience: the data dir as the single scan root.
pub fn roots(env: &TestEnv) -> Vec<PathBuf> {
    vec![env.data_dir.clone()]
}

#[allow(dead_code)]
pub fn touch(path: &Path, content: &str) {
    fs::write(path, content).expect("rewrite fixture");
}
