use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

static OUTPUT_FILE_VAR: &str = "GITHUB_OUTPUT";
static DELIMITER: &str = "_GitHubActionsFileCommandDelimeter_";

/// Sets an output of the current step, so later steps can read it.
pub fn set_output(name: &str, value: &str) -> io::Result<()> {
    match env::var_os(OUTPUT_FILE_VAR) {
        Some(path) if !path.is_empty() => append_output(Path::new(&path), name, value),
        _ => {
            println!("{}", set_output_command(name, value));
            Ok(())
        }
    }
}

fn append_output(path: &Path, name: &str, value: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(file_command(name, value).as_bytes())
}

fn file_command(name: &str, value: &str) -> String {
    format!("{}<<{}\n{}\n{}\n", name, DELIMITER, value, DELIMITER)
}

fn set_output_command(name: &str, value: &str) -> String {
    format!("::set-output name={}::{}", name, escape_data(value))
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
