//! Parameter dictionaries: name to flat numeric array
//!
//! Each on-disk format is a [`DictFormat`] implementation chosen explicitly by the
//! caller; nothing is inferred from the file extension.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use serde::{Deserialize, Serialize};

use crate::create_parent_dir;
use crate::error::{FioError, Result};

/// Trained-parameter snapshot, arrays flattened in row-major order
pub type ParamMap = BTreeMap<String, Vec<f64>>;

pub trait DictFormat {
    fn name(&self) -> &'static str;

    fn decode(&self, bytes: &[u8]) -> Result<ParamMap>;

    fn encode(&self, params: &ParamMap) -> Result<Vec<u8>>;

    /// Load `path`; a missing file yields an empty map
    fn load(&self, path: &Path) -> Result<ParamMap> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), format = self.name(), "Dictionary not found, using empty default");
            return Ok(ParamMap::new());
        }
        tracing::info!(path = %path.display(), format = self.name(), "Loading dictionary");
        self.decode(&std::fs::read(path)?)
    }

    fn save(&self, path: &Path, params: &ParamMap) -> Result<()> {
        tracing::info!(path = %path.display(), format = self.name(), entries = params.len(), "Writing dictionary");
        let bytes = self.encode(params)?;
        create_parent_dir(path)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// JSON object of name to number or (nested) number array
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDict;

fn flatten_numbers(key: &str, value: &serde_json::Value, out: &mut Vec<f64>) -> Result<()> {
    match value {
        serde_json::Value::Number(n) => {
            out.push(n.as_f64().ok_or_else(|| FioError::InvalidDict {
                key: key.to_string(),
                reason: format!("number {n} is not representable"),
            })?);
            Ok(())
        }
        serde_json::Value::Array(items) => {
            for item in items {
                flatten_numbers(key, item, out)?;
            }
            Ok(())
        }
        other => Err(FioError::InvalidDict {
            key: key.to_string(),
            reason: format!("expected numbers, found {other}"),
        }),
    }
}

impl DictFormat for JsonDict {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, bytes: &[u8]) -> Result<ParamMap> {
        let root: serde_json::Value = serde_json::from_slice(bytes)?;
        let serde_json::Value::Object(entries) = root else {
            return Err(FioError::InvalidDict {
                key: "<root>".to_string(),
                reason: "expected a JSON object".to_string(),
            });
        };
        let mut params = ParamMap::new();
        for (key, value) in &entries {
            let mut values = Vec::new();
            flatten_numbers(key, value, &mut values)?;
            params.insert(key.clone(), values);
        }
        Ok(params)
    }

    fn encode(&self, params: &ParamMap) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(params)?)
    }
}

/// Safetensors file of one-dimensional f64 tensors (f32 tensors are widened on load)
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetensorsDict;

impl DictFormat for SafetensorsDict {
    fn name(&self) -> &'static str {
        "safetensors"
    }

    fn decode(&self, bytes: &[u8]) -> Result<ParamMap> {
        let tensors =
            SafeTensors::deserialize(bytes).map_err(|e| FioError::Safetensors(e.to_string()))?;

        let mut params = ParamMap::new();
        for (name, view) in tensors.tensors() {
            let data = view.data();
            let values = match view.dtype() {
                Dtype::F64 => {
                    let mut out = vec![0.0f64; data.len() / 8];
                    LittleEndian::read_f64_into(&data[..out.len() * 8], &mut out);
                    out
                }
                Dtype::F32 => {
                    let mut out = vec![0.0f32; data.len() / 4];
                    LittleEndian::read_f32_into(&data[..out.len() * 4], &mut out);
                    out.into_iter().map(f64::from).collect()
                }
                other => {
                    return Err(FioError::InvalidDtype {
                        name,
                        got: format!("{other:?}"),
                    })
                }
            };
            params.insert(name, values);
        }
        Ok(params)
    }

    fn encode(&self, params: &ParamMap) -> Result<Vec<u8>> {
        let buffers: Vec<(&String, Vec<u8>)> = params
            .iter()
            .map(|(name, values)| {
                let mut bytes = vec![0u8; values.len() * 8];
                LittleEndian::write_f64_into(values, &mut bytes);
                (name, bytes)
            })
            .collect();

        let views = buffers
            .iter()
            .map(|(name, bytes)| {
                TensorView::new(Dtype::F64, vec![bytes.len() / 8], bytes)
                    .map(|view| (name.as_str(), view))
                    .map_err(|e| FioError::Safetensors(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let metadata: Option<HashMap<String, String>> = None;
        safetensors::serialize(views, &metadata).map_err(|e| FioError::Safetensors(e.to_string()))
    }
}

/// Format tag for selecting a [`DictFormat`] at run time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DictKind {
    #[default]
    Json,
    Safetensors,
}

impl DictKind {
    pub fn format(self) -> Box<dyn DictFormat> {
        match self {
            DictKind::Json => Box::new(JsonDict),
            DictKind::Safetensors => Box::new(SafetensorsDict),
        }
    }
}

impl FromStr for DictKind {
    type Err = FioError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(DictKind::Json),
            "safetensors" => Ok(DictKind::Safetensors),
            other => Err(FioError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for DictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.format().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("fitn.w0".to_string(), vec![0.1, -0.25, 1.5]);
        params.insert("fitn.b0".to_string(), vec![0.0]);
        params
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.json");
        JsonDict.save(&path, &sample()).unwrap();
        assert_eq!(JsonDict.load(&path).unwrap(), sample());
    }

    #[test]
    fn test_json_flattens_nested_and_scalars() {
        let params = JsonDict
            .decode(br#"{"w": [[1, 2], [3.5, 4]], "s": 0.5}"#)
            .unwrap();
        assert_eq!(params["w"], [1.0, 2.0, 3.5, 4.0]);
        assert_eq!(params["s"], [0.5]);
    }

    #[test]
    fn test_json_rejects_non_numbers() {
        assert!(JsonDict.decode(br#"{"w": ["a"]}"#).is_err());
        assert!(JsonDict.decode(br#"[1, 2]"#).is_err());
    }

    #[test]
    fn test_safetensors_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub/params.safetensors");
        SafetensorsDict.save(&path, &sample()).unwrap();
        assert_eq!(SafetensorsDict.load(&path).unwrap(), sample());
    }

    #[test]
    fn test_missing_dict_is_empty() {
        let dir = TempDir::new().unwrap();
        for kind in [DictKind::Json, DictKind::Safetensors] {
            let params = kind.format().load(&dir.path().join("none")).unwrap();
            assert!(params.is_empty());
        }
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("safetensors".parse::<DictKind>().unwrap(), DictKind::Safetensors);
        assert_eq!(DictKind::Json.to_string(), "json");
        assert!("npy".parse::<DictKind>().is_err());
    }
}
