pub mod entry;
pub mod transform;
pub mod version;

use serde::Serialize;

/// Error payload shared by the `--json` outputs.
#[derive(Serialize)]
pub struct ErrorJson {
    pub code: String,
    pub message: String,
}

impl From<&ngpass_core::Error> for ErrorJson {
    fn from(err: &ngpass_core::Error) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Print a failed `--json` result and exit with status 1.
pub fn fail_json(schema_version: u32, err: &ngpass_core::Error) -> ! {
    #[derive(Serialize)]
    struct Failure<'a> {
        schema_version: u32,
        ok: bool,
        error: &'a ErrorJson,
    }
    let error = ErrorJson::from(err);
    let failure = Failure {
        schema_version,
        ok: false,
        error: &error,
    };
    match serde_json::to_string_pretty(&failure) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{{\"ok\":false}}"),
    }
    std::process::exit(1);
}
