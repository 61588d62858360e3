//! End-to-end export tests: tensor list in, .txt/.h directory out.

use std::collections::BTreeMap;
use std::path::Path;

use noodle_export::classify::{TaggedClassifier, TensorTag};
use noodle_export::safetensor;
use noodle_export::*;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

// =============================================================================
// Helpers
// =============================================================================

fn read_values(path: &Path) -> Vec<f32> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| l.parse::<f32>().unwrap())
        .collect()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn dir_contents(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    file_names(dir)
        .into_iter()
        .map(|name| {
            let bytes = std::fs::read(dir.join(&name)).unwrap();
            (name, bytes)
        })
        .collect()
}

fn random_tensor(rng: &mut StdRng, shape: &[usize]) -> Tensor {
    let numel: usize = shape.iter().product();
    // Valores representables exactamente con 6 decimales tras el redondeo
    let data = (0..numel).map(|_| rng.gen_range(-512i32..512) as f32 / 8.0).collect();
    Tensor::new(shape.to_vec(), data).unwrap()
}

fn vector(values: &[f32]) -> Tensor {
    Tensor::vector(values.to_vec()).unwrap()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_conv2d_with_bias() {
    let tmp = tempfile::tempdir().unwrap();
    let tensors = vec![
        Tensor::iota(&[3, 3, 4, 8]).unwrap(),
        vector(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]),
    ];

    let report = export(&tensors, tmp.path()).unwrap();
    assert_eq!(report.weights(), 1);
    assert_eq!(report.biases(), 1);
    assert_eq!(report.batchnorms(), 0);

    assert_eq!(
        file_names(tmp.path()),
        vec!["b01.h", "b01.txt", "w01.h", "w01.txt"]
    );

    let w = read_values(&tmp.path().join("w01.txt"));
    assert_eq!(w.len(), 288);
    // OIHW: w[o][i][r][c] = src[r][c][i][o]
    let src = |r: usize, c: usize, i: usize, o: usize| ((r * 3 + c) * 4 + i) * 8 + o;
    assert_eq!(w[0], src(0, 0, 0, 0) as f32);
    assert_eq!(w[1], src(0, 1, 0, 0) as f32);
    assert_eq!(w[9], src(0, 0, 1, 0) as f32);
    assert_eq!(w[36], src(0, 0, 0, 1) as f32);
    assert_eq!(w[287], src(2, 2, 3, 7) as f32);

    assert_eq!(read_values(&tmp.path().join("b01.txt")).len(), 8);

    let header = std::fs::read_to_string(tmp.path().join("w01.h")).unwrap();
    assert!(header.starts_with("#pragma once\n"));
    assert!(header.contains("// kind=conv2d, layout=OIHW\n"));
    assert!(header.contains("// dims: Kh=3, Kw=3, Cin=4, Cout=8\n"));
    assert!(header.contains("static const float w01[] = {\n"));
}

#[test]
fn test_dense_with_batchnorm_only() {
    let tmp = tempfile::tempdir().unwrap();
    let tensors = vec![
        Tensor::iota(&[16, 4]).unwrap(),
        vector(&[1.0, 1.0, 1.0, 1.0]),
        vector(&[2.0, 2.0, 2.0, 2.0]),
        vector(&[3.0, 3.0, 3.0, 3.0]),
        vector(&[4.0, 4.0, 4.0, 4.0]),
    ];

    let report = export(&tensors, tmp.path()).unwrap();
    assert_eq!(report.weights(), 1);
    assert_eq!(report.biases(), 0);
    assert_eq!(report.batchnorms(), 1);
    assert!(!tmp.path().join("b01.txt").exists());

    let w = read_values(&tmp.path().join("w01.txt"));
    assert_eq!(w.len(), 64);
    for o in 0..4 {
        for i in 0..16 {
            assert_eq!(w[o * 16 + i], (i * 4 + o) as f32);
        }
    }

    let bn = read_values(&tmp.path().join("bn01.txt"));
    assert_eq!(
        bn,
        vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0, 4.0]
    );
}

#[test]
fn test_depthwise_multiplier_aborts_without_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("weights");
    let tensors = vec![
        Tensor::iota(&[16, 4]).unwrap(),
        Tensor::iota(&[3, 3, 6, 2]).unwrap(),
    ];
    let classifier = TaggedClassifier::new(vec![TensorTag::Dense, TensorTag::Depthwise2d]);

    let err = export_with(&tensors, &classifier, &out, &ExportConfig::default()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("#1"), "{msg}");
    assert!(msg.contains("[3, 3, 6, 2]"), "{msg}");
    assert!(matches!(err, ExportError::DepthMultiplier { index: 1, multiplier: 2, .. }));

    // El plan falla antes de crear el directorio
    assert!(!out.exists());
}

#[test]
fn test_bias_plus_batchnorm_resumes_at_offset_six() {
    let tmp = tempfile::tempdir().unwrap();
    let c = [0.5f32, 1.5, 2.5];
    let tensors = vec![
        Tensor::iota(&[3, 3, 2, 3]).unwrap(),
        vector(&c),
        vector(&[1.0, 1.0, 1.0]),
        vector(&[0.0, 0.0, 0.0]),
        vector(&[0.25, 0.25, 0.25]),
        vector(&[2.0, 2.0, 2.0]),
        Tensor::iota(&[12, 5]).unwrap(),
        vector(&[9.0; 5]),
    ];

    let report = export(&tensors, tmp.path()).unwrap();
    assert_eq!(report.weights(), 2);
    assert_eq!(report.biases(), 2);
    assert_eq!(report.batchnorms(), 1);

    assert_eq!(read_values(&tmp.path().join("b01.txt")), c.to_vec());
    assert_eq!(read_values(&tmp.path().join("bn01.txt")).len(), 12);

    let w02 = report.artifact("w02").unwrap();
    assert_eq!(w02.sources, vec![6]);
    assert_eq!(w02.tag, "dense");
    assert_eq!(report.artifact("b02").unwrap().sources, vec![7]);
}

#[test]
fn test_single_bias_resumes_at_offset_two() {
    let tmp = tempfile::tempdir().unwrap();
    let tensors = vec![
        Tensor::iota(&[8, 3]).unwrap(),
        vector(&[1.0, 2.0, 3.0]),
        Tensor::iota(&[3, 2]).unwrap(),
    ];

    let report = export(&tensors, tmp.path()).unwrap();
    let names: Vec<&str> = report.artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["w01", "b01", "w02"]);
    assert_eq!(report.artifact("w02").unwrap().sources, vec![2]);
}

#[test]
fn test_standalone_bias_is_never_dropped() {
    let tmp = tempfile::tempdir().unwrap();
    let tensors = vec![vector(&[1.0, 2.0]), Tensor::iota(&[2, 2]).unwrap()];

    let report = export(&tensors, tmp.path()).unwrap();
    assert_eq!(report.biases(), 1);
    assert_eq!(report.artifacts[0].name, "b01");
    assert_eq!(report.artifacts[1].name, "w01");
}

#[test]
fn test_unsupported_rank_skipped_rest_exported() {
    let tmp = tempfile::tempdir().unwrap();
    let tensors = vec![
        Tensor::iota(&[2, 2, 2, 2, 2]).unwrap(),
        Tensor::iota(&[4, 2]).unwrap(),
        vector(&[0.0, 1.0]),
    ];

    let report = export(&tensors, tmp.path()).unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 0);
    assert_eq!(file_names(tmp.path()).len(), 4);
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_rerun_is_byte_identical() {
    let mut rng = StdRng::seed_from_u64(7);
    let tensors = vec![
        random_tensor(&mut rng, &[3, 3, 1, 4]),
        random_tensor(&mut rng, &[4]),
        random_tensor(&mut rng, &[3, 3, 4, 1]),
        random_tensor(&mut rng, &[4]),
        random_tensor(&mut rng, &[4]),
        random_tensor(&mut rng, &[4]),
        random_tensor(&mut rng, &[4]),
        random_tensor(&mut rng, &[36, 10]),
        random_tensor(&mut rng, &[10]),
    ];

    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    export(&tensors, a.path()).unwrap();
    export(&tensors, b.path()).unwrap();
    // Segunda pasada sobre el mismo directorio: sobrescribe igual
    export(&tensors, a.path()).unwrap();

    assert_eq!(dir_contents(a.path()), dir_contents(b.path()));
}

#[test]
fn test_counters_have_no_gaps() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut tensors = Vec::new();
    for _ in 0..12 {
        let din = rng.gen_range(1..6);
        let dout = rng.gen_range(1..6);
        tensors.push(random_tensor(&mut rng, &[din, dout]));
        if rng.gen_bool(0.5) {
            tensors.push(random_tensor(&mut rng, &[dout]));
        }
    }

    let tmp = tempfile::tempdir().unwrap();
    let report = export(&tensors, tmp.path()).unwrap();

    let weights: Vec<String> = report
        .artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::Weight)
        .map(|a| a.name.clone())
        .collect();
    let expected: Vec<String> = (1..=12).map(|i| format!("w{:02}", i)).collect();
    assert_eq!(weights, expected);

    let biases = report.biases();
    for i in 1..=biases {
        assert!(tmp.path().join(format!("b{:02}.h", i)).exists());
    }
    assert!(!tmp.path().join(format!("b{:02}.txt", biases + 1)).exists());
}

#[test]
fn test_conv2d_layout_random_shapes() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..20 {
        let (kh, kw, cin, cout) = (
            rng.gen_range(2..5),
            rng.gen_range(2..5),
            rng.gen_range(1..5),
            rng.gen_range(2..6),
        );
        let t = random_tensor(&mut rng, &[kh, kw, cin, cout]);
        let out = transcode(0, &t, KernelKind::Conv2D).unwrap();
        assert_eq!(out.values.len(), kh * kw * cin * cout);

        for o in 0..cout {
            for i in 0..cin {
                for r in 0..kh {
                    for c in 0..kw {
                        let dst = ((o * cin + i) * kh + r) * kw + c;
                        let src = ((r * kw + c) * cin + i) * cout + o;
                        assert_eq!(out.values[dst], t.data()[src]);
                    }
                }
            }
        }
    }
}

#[test]
fn test_dense_layout_random_shapes() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let (din, dout) = (rng.gen_range(1..40), rng.gen_range(1..12));
        let t = random_tensor(&mut rng, &[din, dout]);
        let out = transcode(0, &t, KernelKind::Dense).unwrap();
        assert_eq!(out.values.len(), din * dout);

        for o in 0..dout {
            for i in 0..din {
                assert_eq!(out.values[o * din + i], t.data()[i * dout + o]);
            }
        }
    }
}

#[test]
fn test_depthwise1d_layout_random_shapes() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let (k, cin, m) = (rng.gen_range(1..6), rng.gen_range(2..9), rng.gen_range(1..4));
        let t = random_tensor(&mut rng, &[k, cin, m]);
        let out = transcode(0, &t, KernelKind::Depthwise1D).unwrap();
        assert_eq!(out.values.len(), k * cin * m);

        for c in 0..cin {
            for mm in 0..m {
                for kk in 0..k {
                    let dst = (c * m + mm) * k + kk;
                    let src = (kk * cin + c) * m + mm;
                    assert_eq!(out.values[dst], t.data()[src]);
                }
            }
        }
    }
}

#[test]
fn test_tagged_scalar_in_bias_slot_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let tensors = vec![
        Tensor::iota(&[16, 4]).unwrap(),
        Tensor::new(vec![], vec![0.5]).unwrap(),
        Tensor::iota(&[4, 2]).unwrap(),
    ];
    let classifier = TaggedClassifier::new(vec![TensorTag::Dense, TensorTag::Bias, TensorTag::Dense]);

    let report = export_with(&tensors, &classifier, tmp.path(), &ExportConfig::default()).unwrap();
    assert_eq!(report.weights(), 2);
    assert_eq!(report.biases(), 0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 1);
}

#[test]
fn test_leftover_artifacts_warn_against_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ExportConfig {
        write_manifest: true,
        ..ExportConfig::default()
    };

    let three = vec![
        Tensor::iota(&[2, 2]).unwrap(),
        Tensor::iota(&[2, 2]).unwrap(),
        Tensor::iota(&[2, 2]).unwrap(),
    ];
    export_with(&three, &HeuristicClassifier, tmp.path(), &config).unwrap();

    // Segundo pase más corto sobre el mismo directorio: w03 queda huérfano
    let two = vec![Tensor::iota(&[2, 2]).unwrap(), Tensor::iota(&[2, 2]).unwrap()];
    export_with(&two, &HeuristicClassifier, tmp.path(), &config).unwrap();

    let verified = verify_dir(tmp.path()).unwrap();
    assert!(
        verified.warnings.iter().any(|w| w.contains("w03") && w.contains("manifest")),
        "{:?}",
        verified.warnings
    );
}

#[test]
fn test_exported_directory_verifies() {
    let mut rng = StdRng::seed_from_u64(5);
    let tensors = vec![
        random_tensor(&mut rng, &[5, 2, 8]),
        random_tensor(&mut rng, &[8]),
        random_tensor(&mut rng, &[3, 8, 1]),
        random_tensor(&mut rng, &[8]),
        random_tensor(&mut rng, &[8]),
        random_tensor(&mut rng, &[8]),
        random_tensor(&mut rng, &[8]),
        random_tensor(&mut rng, &[8]),
        random_tensor(&mut rng, &[24, 3]),
    ];

    let tmp = tempfile::tempdir().unwrap();
    let config = ExportConfig {
        write_meta: true,
        write_manifest: true,
        ..ExportConfig::default()
    };
    let report = export_with(&tensors, &HeuristicClassifier, tmp.path(), &config).unwrap();
    assert_eq!(report.weights(), 3);
    assert_eq!(report.artifact("w02").unwrap().tag, "depthwise1d");

    let verified = verify_dir(tmp.path()).unwrap();
    assert!(verified.valid, "{:?}", verified.errors);
    assert!(verified.warnings.is_empty(), "{:?}", verified.warnings);
    assert_eq!(verified.artifacts.len(), report.total_artifacts());
}

#[test]
fn test_tampered_txt_fails_manifest_check() {
    let tmp = tempfile::tempdir().unwrap();
    let tensors = vec![Tensor::iota(&[2, 2]).unwrap(), vector(&[1.0, 2.0])];
    let config = ExportConfig {
        write_manifest: true,
        ..ExportConfig::default()
    };
    export_with(&tensors, &HeuristicClassifier, tmp.path(), &config).unwrap();

    std::fs::write(tmp.path().join("b01.txt"), "1.000000e+00\n3.000000e+00\n").unwrap();
    let verified = verify_dir(tmp.path()).unwrap();
    assert!(!verified.valid);
    assert!(verified.errors.iter().any(|e| e.contains("checksum")));
}

#[test]
fn test_safetensors_file_to_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let model = tmp.path().join("model.safetensors");
    let tensors = vec![
        NamedTensor::new("conv/kernel", Tensor::iota(&[3, 3, 1, 2]).unwrap()),
        NamedTensor::new("conv/bias", vector(&[0.1, 0.2])),
        NamedTensor::new("dense/kernel", Tensor::iota(&[18, 3]).unwrap()),
        NamedTensor::new("dense/bias", vector(&[0.0, 0.0, 0.0])),
    ];
    safetensor::write_f32(&model, &tensors).unwrap();

    let loaded = safetensor::load_ordered(&model).unwrap();
    let out = tmp.path().join("weights");
    let report = export(&loaded, &out).unwrap();
    assert_eq!(report.weights(), 2);
    assert_eq!(report.biases(), 2);
    assert!(verify_dir(&out).unwrap().valid);
}
