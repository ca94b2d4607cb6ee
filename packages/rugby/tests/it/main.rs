use rugby::path::AbsDirPath;
use tempfile::TempDir;

pub mod orchestrator;

#[track_caller]
fn temporary_directory() -> (TempDir, AbsDirPath) {
    let dir = TempDir::new().expect("create temporary directory");
    let path = AbsDirPath::try_from(dir.path().to_path_buf()).expect("read temp dir as abs dir");
    (dir, path)
}
