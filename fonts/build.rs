use std::env;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use zip::ZipArchive;

const FONT_FILE: &str = "SourceHanSansSC-Regular.otf";
// pinned release; the SC zip carries the Regular OTF somewhere inside
const ZIP_URL: &str =
    "https://github.com/adobe-fonts/source-han-sans/releases/download/2.005R/09_SourceHanSansSC.zip";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=ATLAS_FONT");
    println!("cargo:rerun-if-env-changed=ATLAS_OFFLINE");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let target_font = out_dir.join(FONT_FILE);

    // non-empty from an earlier build
    if fs::metadata(&target_font).is_ok_and(|m| m.len() > 0) {
        return;
    }

    let result = match env::var("ATLAS_FONT") {
        Ok(path) => fs::read(&path).map_err(|e| format!("cannot read ATLAS_FONT={path}: {e}")),
        Err(_) if env::var_os("ATLAS_OFFLINE").is_some() => Err("ATLAS_OFFLINE is set".to_string()),
        Err(_) => download_and_extract(&out_dir),
    };

    let bytes = match result {
        Ok(b) => b,
        Err(e) => {
            println!("cargo:warning=embedded font unavailable ({e}); panel text will use system fonts");
            Vec::new()
        }
    };
    fs::write(&target_font, bytes).expect("write font into OUT_DIR");
}

fn fetch(url: &str, dest: &Path) -> bool {
    let Some(dest) = dest.to_str() else {
        return false;
    };
    let curl = Command::new("curl").args(["-L", "-f", "-s", "-o", dest, url]).status();
    if let Ok(st) = curl
        && st.success()
    {
        return true;
    }
    let wget = Command::new("wget").args(["-q", "-O", dest, url]).status();
    matches!(wget, Ok(st) if st.success())
}

fn download_and_extract(out_dir: &Path) -> Result<Vec<u8>, String> {
    let zip_path = out_dir.join("SourceHanSansSC.zip");
    if !fetch(ZIP_URL, &zip_path) {
        return Err(format!("download of {ZIP_URL} failed"));
    }
    let data = fs::read(&zip_path).map_err(|e| format!("zip read: {e}"))?;
    let mut zip = ZipArchive::new(Cursor::new(data)).map_err(|e| format!("zip parse: {e}"))?;
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).map_err(|e| format!("zip entry {i}: {e}"))?;
        if file.name().ends_with(FONT_FILE) {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .map_err(|e| format!("extract {FONT_FILE}: {e}"))?;
            return Ok(buf);
        }
    }
    Err(format!("{FONT_FILE} not found in archive"))
}
