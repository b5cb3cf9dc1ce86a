// pipeline.rs — Input loading, provenance, and output placement
//
// Everything around `codegen` that touches the outside world: reading the
// controller JSON, hashing it for the generated header and `--emit build-info`,
// and writing the generated file plus the optional runtime support template.
//
// Preconditions: none.
// Postconditions: on success, output files exist under `<out>/Code/`.
// Failure modes: `CliError::Io` / `CliError::Json` with the offending path.
// Side effects: filesystem reads and writes (never during generation itself).

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::codegen::GeneratedCode;
use crate::error::{CliError, GenError};
use crate::model::Controller;

/// Directory under the output root that receives generated sources.
pub const CODE_DIR: &str = "Code";

/// Placeholder replaced with the namespace in the runtime support template.
pub const NAMESPACE_PLACEHOLDER: &str = "[NAMESPACE]";

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for reproducible output.
///
/// `source_hash`: SHA-256 of the controller's canonical compact JSON, so
/// formatting differences in the input file do not change it.
/// `generator_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub generator_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Serialize provenance as a JSON string for `--emit build-info`.
    pub fn to_json(&self) -> String {
        format!(
            "{{\n  \"source_hash\": \"{}\",\n  \"generator_version\": \"{}\"\n}}\n",
            self.source_hash_hex(),
            self.generator_version,
        )
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Hash the canonical form of `controller`.
pub fn compute_provenance(controller: &Controller) -> Result<Provenance, GenError> {
    let canonical = serde_json::to_vec(controller).map_err(GenError::Canonicalize)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    let result = hasher.finalize();
    let mut source_hash = [0u8; 32];
    source_hash.copy_from_slice(&result);

    Ok(Provenance {
        source_hash,
        generator_version: env!("CARGO_PKG_VERSION"),
    })
}

// ── Input ──────────────────────────────────────────────────────────────────

pub fn load_controller(path: &Path) -> Result<Controller, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_controller(&text, path)
}

/// Parse controller JSON; `path` only labels errors.
pub fn parse_controller(text: &str, path: &Path) -> Result<Controller, CliError> {
    serde_json::from_str(text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

// ── Output ─────────────────────────────────────────────────────────────────

/// Write the generated source to `<out_dir>/Code/<file_name>` and return the path.
pub fn write_generated(out_dir: &Path, generated: &GeneratedCode) -> Result<PathBuf, CliError> {
    let code_dir = out_dir.join(CODE_DIR);
    create_dir(&code_dir)?;
    let path = code_dir.join(&generated.file_name);
    write_file(&path, &generated.source)?;
    debug!(path = %path.display(), bytes = generated.source.len(), "wrote generated source");
    Ok(path)
}

/// Copy the runtime support template next to the generated source, with the
/// namespace placeholder substituted. Keeps the template's file name.
pub fn write_runtime_support(
    template: &Path,
    out_dir: &Path,
    namespace: &str,
) -> Result<PathBuf, CliError> {
    let text = fs::read_to_string(template).map_err(|source| CliError::Io {
        path: template.to_path_buf(),
        source,
    })?;
    let file_name = template.file_name().ok_or_else(|| CliError::Io {
        path: template.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
    })?;

    let code_dir = out_dir.join(CODE_DIR);
    create_dir(&code_dir)?;
    let path = code_dir.join(file_name);
    write_file(&path, &substitute_namespace(&text, namespace))?;
    debug!(path = %path.display(), "wrote runtime support");
    Ok(path)
}

pub fn substitute_namespace(template: &str, namespace: &str) -> String {
    template.replace(NAMESPACE_PLACEHOLDER, namespace)
}

fn create_dir(dir: &Path) -> Result<(), CliError> {
    fs::create_dir_all(dir).map_err(|source| CliError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    fs::write(path, contents).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{codegen, GenOptions};
    use crate::model::{Layer, StateMachine};

    fn minimal() -> Controller {
        let mut c = Controller::named("Avatar");
        let m = c.add_machine(StateMachine::named("Base"));
        c.add_layer(Layer {
            name: "Base".into(),
            machine: m,
            ..Layer::default()
        });
        c
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ctrlgen-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn provenance_ignores_input_formatting() {
        let compact = r#"{"name":"Avatar","layers":[{"name":"Base","machine":0}],"machines":[{"name":"Base"}]}"#;
        let pretty = "{\n  \"name\": \"Avatar\",\n  \"machines\": [ { \"name\": \"Base\" } ],\n  \"layers\": [ { \"name\": \"Base\", \"machine\": 0 } ]\n}";
        let a = parse_controller(compact, Path::new("a.json")).unwrap();
        let b = parse_controller(pretty, Path::new("b.json")).unwrap();
        assert_eq!(
            compute_provenance(&a).unwrap(),
            compute_provenance(&b).unwrap()
        );
        assert_eq!(a, minimal());
    }

    #[test]
    fn provenance_changes_with_content() {
        let a = minimal();
        let mut b = minimal();
        b.name = "Other".into();
        let pa = compute_provenance(&a).unwrap();
        let pb = compute_provenance(&b).unwrap();
        assert_ne!(pa.source_hash, pb.source_hash);
        assert_eq!(pa.source_hash_hex().len(), 64);
    }

    #[test]
    fn build_info_json_is_parseable() {
        let p = compute_provenance(&minimal()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&p.to_json()).unwrap();
        assert_eq!(v["source_hash"], p.source_hash_hex());
        assert_eq!(v["generator_version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn invalid_json_reports_path() {
        let err = parse_controller("{ not json", Path::new("broken.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().starts_with("broken.json: invalid controller JSON"));
    }

    #[test]
    fn missing_input_is_io_error() {
        let err = load_controller(Path::new("/nonexistent/controller.json")).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn writes_generated_and_runtime_support() {
        let out = scratch_dir("write");
        let generated = codegen(&minimal(), &GenOptions::default()).unwrap();
        let path = write_generated(&out, &generated).unwrap();
        assert_eq!(path, out.join("Code").join("Avatar.cs"));
        assert_eq!(fs::read_to_string(&path).unwrap(), generated.source);

        let template = out.join("ControllerGenerationMethods.cs");
        fs::write(&template, "namespace [NAMESPACE]\n{\n}\n").unwrap();
        let support = write_runtime_support(&template, &out, "Avatar").unwrap();
        assert_eq!(
            fs::read_to_string(support).unwrap(),
            "namespace Avatar\n{\n}\n"
        );
        let _ = fs::remove_dir_all(&out);
    }
}
