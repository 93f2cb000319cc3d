//! fxpack Integration Tests
//!
//! Cross-crate checks: bit-width resolution feeding the codec, packed records
//! written to disk, and records read back for verification.

use fxpack_config::{resolve, resolve_variant, ConfigError, ConfigSchema, SizeVariant};
use fxpack_fio::{BinFile, DictFormat, DictKind, JsonDict, ParamMap, SafetensorsDict, TxtFile};
use fxpack_fixed_point::{
    extend_count, merge_groups, parse_bit_strings, reverse_groups, split_by_width, BitString,
    Codec, CodecConfig, Domain, RoundMode,
};
use fxpack_harness::{FieldSpec, HarnessError, Pipeline, PipelineConfig, RecordLayout};

fn strs(list: &[BitString]) -> Vec<&str> {
    list.iter().map(BitString::as_str).collect()
}

// =============================================================================
// Section 1: Codec Tests
// =============================================================================

mod codec_tests {
    use super::*;

    /// Real values to signed 8-bit patterns with 6 fractional bits
    #[test]
    fn test_reals_to_signed_patterns() {
        let codec = Codec::default();
        let domain = Domain::signed(8).unwrap();
        let (bits, report) =
            codec.encode_reals(&[0.1, -0.1, 1.5], RoundMode::Round, 6, domain, "w");

        assert_eq!(strs(&bits), ["00000110", "11111010", "01100000"]);
        // symmetric domain: 96 fits under the signed-8 maximum of 127
        assert_eq!(codec.from_binary_strings(&bits, true).unwrap(), [6, -6, 96]);
        assert!(report.is_clean());
    }

    #[test]
    fn test_signed_domain_excludes_most_negative() {
        let codec = Codec::new(CodecConfig::verbose());
        let domain = Domain::signed(8).unwrap();
        let (bits, report) = codec.to_binary_strings_with_report(&[-128, 127], domain, "w");

        assert_eq!(strs(&bits), ["10000001", "01111111"]);
        assert_eq!(report.below, 1);
        assert_eq!(report.lowest, Some(-128));
    }

    #[test]
    fn test_assembly_primitives() {
        let list = parse_bit_strings(&["10010", "10100"]).unwrap();
        assert_eq!(
            strs(&extend_count(&list, 4).unwrap()),
            ["10010", "10100", "00000", "00000"]
        );

        let list = parse_bit_strings(&["00", "01", "10", "11"]).unwrap();
        assert_eq!(strs(&reverse_groups(&list, 2).unwrap()), ["01", "00", "11", "10"]);
        assert_eq!(strs(&merge_groups(&list, 2).unwrap()), ["0001", "1011"]);

        let word = BitString::new("1100110").unwrap();
        assert_eq!(strs(&split_by_width(&word, 4).unwrap()), ["0110", "0110"]);
    }
}

// =============================================================================
// Section 2: Configuration Tests
// =============================================================================

mod config_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_power_of_two_index_width() {
        let base = json!({
            "dscp": { "sel": [60, 60], "NIDP": "sum(sel)", "NIX": "2^ceil(log2(NIDP/1.5))" }
        });
        let config = resolve(&base, &json!({})).unwrap();
        assert_eq!(config.int("dscp", "NIX").unwrap(), 128);
    }

    #[test]
    fn test_override_changes_dependents() {
        let base = json!({
            "ctrl": { "NSTDM": 64, "NTYPE": 4, "NSEL": "NSTDM*NTYPE" },
            "nbit": { "NBIT_SEL": "ln2(NSEL)" }
        });
        let config = resolve(&base, &json!({ "ctrl": { "NSTDM": 16 } })).unwrap();
        assert_eq!(config.int("ctrl", "NSEL").unwrap(), 64);
        assert_eq!(config.nbit("NBIT_SEL").unwrap(), 6);
    }

    #[test]
    fn test_cycle_reports_path() {
        let base = json!({ "ctrl": { "A": "B", "B": "A" } });
        let err = resolve(&base, &json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::CyclicDependency { .. }));
    }

    #[test]
    fn test_variants_are_ordered_by_size() {
        let widths: Vec<u32> = SizeVariant::ALL
            .into_iter()
            .map(|v| resolve_variant(v).unwrap().nbit("NBIT_SEL").unwrap())
            .collect();
        assert!(widths.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_schema_from_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path().join("base.json");
        let overrides = dir.path().join("override.json");
        std::fs::write(&base, r#"{"size": {"N": 4, "M": "N*2"}}"#).unwrap();
        std::fs::write(&overrides, r#"{"size": {"N": 10}}"#).unwrap();

        let config = ConfigSchema::from_json_files(&base, Some(overrides.as_path()))
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(config.int("size", "M").unwrap(), 20);
    }
}

// =============================================================================
// Section 3: File I/O Tests
// =============================================================================

mod fio_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dict_formats_agree() {
        let dir = TempDir::new().unwrap();
        let mut params = ParamMap::new();
        params.insert("w".to_string(), vec![0.125, -3.0, 7.5]);

        let json = dir.path().join("p.json");
        let st = dir.path().join("p.safetensors");
        JsonDict.save(&json, &params).unwrap();
        SafetensorsDict.save(&st, &params).unwrap();

        assert_eq!(DictKind::Json.format().load(&json).unwrap(), params);
        assert_eq!(DictKind::Safetensors.format().load(&st).unwrap(), params);
    }

    #[test]
    fn test_missing_files_fall_back() {
        let dir = TempDir::new().unwrap();
        assert!(BinFile::load(dir.path().join("x.bin")).unwrap().is_empty());
        assert!(TxtFile::load(dir.path().join("x.txt")).unwrap().is_empty());
        assert!(JsonDict.load(&dir.path().join("x.json")).unwrap().is_empty());
    }
}

// =============================================================================
// Section 4: Pipeline Tests
// =============================================================================

mod pipeline_tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn fields(specs: &[&str]) -> Vec<FieldSpec> {
        specs.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_end_to_end_record() {
        let dir = TempDir::new().unwrap();
        let settings = PipelineConfig {
            size: SizeVariant::Net32,
            name: "fitn".to_string(),
            ..Default::default()
        };
        let layout = RecordLayout::new(fields(&["w:8:6", "sel:NBIT_SEL:0:u"])).with_group(2);
        let pipeline = Pipeline::new(&settings, layout).unwrap();
        let sel_bits = pipeline.config().nbit("NBIT_SEL").unwrap() as usize;

        let mut params = ParamMap::new();
        params.insert("w".to_string(), vec![0.1, -0.1, 1.5]);
        params.insert("sel".to_string(), vec![1.0, 2.0, 3.0]);

        let summary = pipeline.run(&params, dir.path()).unwrap();
        assert_eq!(summary.elements, 3);
        assert_eq!(summary.words, 4);
        assert_eq!(summary.tokens, 4 * (8 + sel_bits).div_ceil(8));
        assert_eq!(TxtFile::load(&summary.txt_path).unwrap().len(), summary.tokens);

        pipeline.verify(&params, &summary.bin_path).unwrap();
    }

    #[test]
    fn test_clamping_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let layout = RecordLayout::new(fields(&["w:4:2"]));
        let pipeline = Pipeline::new(&PipelineConfig::default(), layout).unwrap();

        let mut params = ParamMap::new();
        params.insert("w".to_string(), vec![10.0, -10.0, 0.5]);
        let summary = pipeline.run(&params, dir.path()).unwrap();

        assert_eq!(summary.report.clamped(), 2);
        pipeline.verify(&params, &summary.bin_path).unwrap();
    }

    #[test]
    fn test_truncated_record_fails_verification() {
        let dir = TempDir::new().unwrap();
        let layout = RecordLayout::new(fields(&["w:12:0"]));
        let pipeline = Pipeline::new(&PipelineConfig::default(), layout).unwrap();

        let mut params = ParamMap::new();
        params.insert("w".to_string(), vec![100.0, 200.0]);
        let summary = pipeline.run(&params, dir.path()).unwrap();

        let mut bytes = std::fs::read(&summary.bin_path).unwrap();
        bytes.truncate(3);
        std::fs::write(&summary.bin_path, bytes).unwrap();
        assert!(matches!(
            pipeline.verify(&params, &summary.bin_path),
            Err(HarnessError::InvalidInput(_))
        ));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_decode_recovers_clamped_values(
            a in proptest::collection::vec(-40.0f64..40.0, 1..20),
            b in proptest::collection::vec(0.0f64..600.0, 1..20),
            group in 1usize..5,
        ) {
            let config = resolve_variant(SizeVariant::Net16).unwrap();
            let codec = Codec::default();
            let layout = RecordLayout::new(fields(&["a:6:1", "b:9:0:u"])).with_group(group);

            let mut params = ParamMap::new();
            params.insert("a".to_string(), a);
            params.insert("b".to_string(), b);

            let record = layout.encode(&params, &config, &codec).unwrap();
            let bytes: Vec<u8> = record.tokens.iter().map(|t| t.to_byte().unwrap()).collect();
            let decoded = layout.decode(&bytes, record.elements, &config, &codec).unwrap();
            prop_assert_eq!(decoded, layout.expected(&params, &config).unwrap());
        }
    }
}
