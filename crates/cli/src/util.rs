use std::path::Path;

use typed_path::Utf8NativePathBuf;

// For argp::FromArgs
pub fn native_path(value: &str) -> Result<Utf8NativePathBuf, String> {
    if value.is_empty() {
        return Err("path must not be empty".to_string());
    }
    Ok(Utf8NativePathBuf::from(value))
}

pub fn std_path(path: &Utf8NativePathBuf) -> &Path { Path::new(path.as_str()) }
