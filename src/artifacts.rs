//! Compiled contract artifacts on disk

use crate::error::{EngineError, EngineResult};

use ethers::abi::Abi;
use ethers::types::{Address, Bytes};
use ethers::utils::to_checksum;
use std::fs;
use std::path::Path;
use tracing::info;

fn artifact_error(path: &Path, message: impl ToString) -> EngineError {
    EngineError::Artifact {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

/// Parse an ABI JSON document
pub fn load_abi(path: &Path) -> EngineResult<Abi> {
    let content = fs::read_to_string(path).map_err(|e| artifact_error(path, e))?;
    serde_json::from_str(&content).map_err(|e| artifact_error(path, e))
}

/// Read hex-encoded creation bytecode. Surrounding whitespace and a `0x`
/// prefix are accepted.
pub fn load_bytecode(path: &Path) -> EngineResult<Bytes> {
    let content = fs::read_to_string(path).map_err(|e| artifact_error(path, e))?;
    let trimmed = content.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if digits.is_empty() {
        return Err(artifact_error(path, "bytecode file is empty"));
    }

    let code = hex::decode(digits).map_err(|e| artifact_error(path, e))?;
    Ok(Bytes::from(code))
}

/// Persist a deployed contract address as checksummed hex, no newline
pub fn write_contract_address(path: &Path, address: Address) -> EngineResult<()> {
    fs::write(path, to_checksum(&address, None)).map_err(|e| artifact_error(path, e))?;
    info!(path = %path.display(), ?address, "Contract address saved");
    Ok(())
}

pub fn read_contract_address(path: &Path) -> EngineResult<Address> {
    let content = fs::read_to_string(path).map_err(|e| artifact_error(path, e))?;
    content
        .trim()
        .parse::<Address>()
        .map_err(|e| artifact_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::COUNTER_ABI_JSON;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_abi() {
        let file = file_with(COUNTER_ABI_JSON);
        let abi = load_abi(file.path()).unwrap();
        assert!(abi.function("increment").is_ok());
        assert!(abi.event("CountIncremented").is_ok());
    }

    #[test]
    fn test_load_abi_rejects_garbage() {
        let file = file_with("{ not json");
        assert!(matches!(
            load_abi(file.path()),
            Err(EngineError::Artifact { .. })
        ));
    }

    #[test]
    fn test_load_bytecode_trims_prefix_and_whitespace() {
        let file = file_with("  0x6080604052\n");
        let code = load_bytecode(file.path()).unwrap();
        assert_eq!(code.to_vec(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);

        let bare = file_with("6080");
        assert_eq!(load_bytecode(bare.path()).unwrap().to_vec(), vec![0x60, 0x80]);
    }

    #[test]
    fn test_load_bytecode_rejects_empty_and_bad_hex() {
        assert!(load_bytecode(file_with("0x\n").path()).is_err());
        assert!(load_bytecode(file_with("0xzz").path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_bytecode(&dir.path().join("Counter.bin"));
        assert!(matches!(result, Err(EngineError::Artifact { .. })));
    }

    #[test]
    fn test_contract_address_is_checksummed_without_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contract_address.txt");
        let address: Address = "0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap();

        write_contract_address(&path, address).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "0x5FbDB2315678afecb367f032d93F642f64180aa3");
        assert_eq!(read_contract_address(&path).unwrap(), address);
    }
}
