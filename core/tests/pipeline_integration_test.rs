//! End-to-end tests of step resolution.
//!
//! Each test runs a job document through schema validation, the evaluator
//! engine and the texture pipeline, and checks the resolved steps.

mod fixtures;

use tempfile::tempdir;

use proc_gen::texture::BitDepth;
use sceneforge_core::{
    Catalog, JobDocument, OutputWriter, PipelineError, Preprocessor, ResolveError, TextureHandle,
    resolve_step,
};
use serde_json::json;

#[test]
fn test_linear_location_per_step() {
    let raw = fixtures::job(
        "
general: {steps: 3, seeds: {numpy: 1}}
transformations:
  camera_rig:
    location: {linear: [[0, 0, 0], [1, 0, 0]]}
    rotation: [0, 0, 0]
scene: {}
sensor: {}
",
    );
    let catalog = Catalog::new();
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);

    let steps = Preprocessor::new(&catalog, &schema, &registry)
        .run(&raw)
        .expect("Job resolves");
    let locations: Vec<_> = steps
        .iter()
        .map(|s| s.document["transformations"]["camera_rig"]["location"].clone())
        .collect();
    assert_eq!(
        locations,
        [json!([0.0, 0.0, 0.0]), json!([1.0, 0.0, 0.0]), json!([2.0, 0.0, 0.0])]
    );
}

#[test]
fn test_uniform_draws_stay_in_range() {
    let raw = fixtures::scene_job(
        200,
        "  ground:\n    - name: floor\n      size: {uniform: [0, 1]}",
    );
    let catalog = Catalog::new();
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);

    let steps = Preprocessor::new(&catalog, &schema, &registry)
        .run(&raw)
        .expect("Job resolves");
    let sizes: Vec<f64> = steps
        .iter()
        .map(|s| s.document["scene"]["ground"][0]["size"].as_f64().unwrap())
        .collect();
    assert!(sizes.iter().all(|v| (0.0..1.0).contains(v)));
    let mean = sizes.iter().sum::<f64>() / sizes.len() as f64;
    assert!((mean - 0.5).abs() < 0.1, "mean {mean}");
}

#[test]
fn test_step_evaluator_cycles() {
    let raw = fixtures::scene_job(
        5,
        "  ground:\n    - name: floor\n      size: 1\n      texture: {step: [sand, grass]}",
    );
    let catalog = Catalog::new();
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);

    let steps = Preprocessor::new(&catalog, &schema, &registry)
        .run(&raw)
        .expect("Job resolves");
    let textures: Vec<_> = steps
        .iter()
        .map(|s| s.document["scene"]["ground"][0]["texture"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(textures, ["sand", "grass", "sand", "grass", "sand"]);
}

#[test]
fn test_global_evaluator_shared_within_step() {
    let raw = fixtures::job(
        "
general: {steps: 4, seeds: {numpy: 9}}
global_evaluators:
  height: {uniform: [1, 5]}
transformations:
  left:
    location: [0, 0, 0]
    rotation: [0, 0, 0]
scene:
  ground:
    - {name: a, size: $global.height}
    - {name: b, size: $global.height}
sensor: {}
",
    );
    let catalog = Catalog::new();
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);

    let steps = Preprocessor::new(&catalog, &schema, &registry)
        .run(&raw)
        .expect("Job resolves");
    for step in &steps {
        let ground = &step.document["scene"]["ground"];
        assert_eq!(ground[0]["size"], ground[1]["size"]);
        assert_eq!(ground[0]["size"], step.globals["height"]);
        assert!(step.document.get("global_evaluators").is_none());
    }
    assert_ne!(steps[0].globals["height"], steps[1].globals["height"]);
}

const CHAINED_TEXTURE_JOB: &str = "
general: {steps: 4, seeds: {numpy: 3}}
global_evaluators:
  source: {step: [a, b]}
scene:
  ground:
    - name: floor
      size: 5
      texture: Preprocessed Assets/picked
sensor: {}
textures:
  a:
    config: {image_size: [8, 8], bit_depth: 8}
    ops:
      - perlin: {octaves: 2}
      - contrast: {uniform: [0.5, 2.0]}
  b:
    config: {image_size: [8, 8], bit_depth: 8}
    ops:
      - input_texture: a
      - math_expression: x * 0.5
  diff:
    config: {image_size: [8, 8], bit_depth: 8}
    ops:
      - math_expression: a - b
  picked:
    config: {image_size: [8, 8], bit_depth: 8}
    ops:
      - input_texture: $global.source
";

#[test]
fn test_dynamic_textures_chain_across_levels() {
    let raw = fixtures::job(CHAINED_TEXTURE_JOB);
    let catalog = Catalog::new();
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);

    let steps = Preprocessor::new(&catalog, &schema, &registry)
        .run(&raw)
        .expect("Job resolves");
    assert_eq!(steps.len(), 4);
    for step in &steps {
        let texture = |id: &str| &step.textures[id].instances[0];
        assert!(step.textures.values().all(|t| !t.is_static));

        let halved: Vec<f32> = texture("a").pixels.iter().map(|p| p * 0.5).collect();
        assert_eq!(texture("b").pixels, halved);

        let diff: Vec<f32> = texture("a")
            .pixels
            .iter()
            .zip(&texture("b").pixels)
            .map(|(a, b)| a - b)
            .collect();
        assert_eq!(texture("diff").pixels, diff);

        let source = if step.step % 2 == 0 { "a" } else { "b" };
        assert_eq!(step.globals["source"], json!(source));
        assert_eq!(texture("picked"), texture(source));
        assert_eq!(
            step.document["scene"]["ground"][0]["texture"],
            json!(["texture://picked/0"])
        );
    }
    assert_ne!(steps[0].textures["a"], steps[1].textures["a"]);
}

#[test]
fn test_texture_selection_feeds_texture_reference() {
    let raw = fixtures::job(
        "
general: {steps: 6, seeds: {numpy: 11}}
global_evaluators:
  ground_texture: {random_selection: [Preprocessed Assets/a, Preprocessed Assets/b]}
scene:
  ground:
    - name: selected
      size: 5
      texture: {selection_asset: {library: Preprocessed Assets, type: texture}}
    - name: global
      size: 5
      texture: $global.ground_texture
sensor: {}
textures:
  a:
    config: {image_size: [4, 4], bit_depth: 8}
    ops:
      - perlin: {octaves: 1}
  b:
    config: {image_size: [4, 4], bit_depth: 8, num_textures: 2}
    ops:
      - input_texture: a
      - contrast: 1.5
",
    );
    let catalog = Catalog::new();
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);

    let steps = Preprocessor::new(&catalog, &schema, &registry)
        .run(&raw)
        .expect("Job resolves");
    for step in &steps {
        let ground = &step.document["scene"]["ground"];
        for plane in [&ground[0], &ground[1]] {
            let handles = plane["texture"].as_array().expect("Texture became handles");
            assert!(!handles.is_empty());
            for handle in handles {
                let handle = TextureHandle::parse(handle.as_str().unwrap()).expect("Handle parses");
                assert!(["a", "b"].contains(&handle.id.as_str()));
                assert_eq!(step.texture(&handle).expect("Handle resolves").width, 4);
            }
        }
        let global = step.globals["ground_texture"].as_str().unwrap();
        let id = global.trim_start_matches("Preprocessed Assets/");
        assert_eq!(ground[1]["texture"].as_array().unwrap().len(), step.textures[id].instances.len());
    }
}

#[test]
fn test_texture_ids_cannot_escape_output_dir() {
    let raw = fixtures::job(
        "
general: {steps: 1, seeds: {numpy: 0}}
scene: {}
sensor: {}
textures:
  ../escaped:
    config: {image_size: [4, 4], bit_depth: 8}
    ops:
      - perlin: {octaves: 1}
",
    );
    let catalog = Catalog::new();
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);

    match Preprocessor::new(&catalog, &schema, &registry)
        .prepare(&raw)
        .expect_err("Texture id is not a file name")
    {
        PipelineError::Invalid(report) => {
            assert!(report.issues.iter().any(|i| i.path == "/textures/..~1escaped"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_wildcard_selects_matching_models() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = fixtures::tree_catalog(dir.path());
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);

    let raw = fixtures::scene_job(
        30,
        "  object:\n    - name: forest\n      models: {selection_wildcard: {library: Trees, pattern: Tree_*}}",
    );
    let steps = Preprocessor::new(&catalog, &schema, &registry)
        .run(&raw)
        .expect("Job resolves");

    let mut seen: Vec<String> = steps
        .iter()
        .map(|s| s.document["scene"]["object"][0]["models"].as_str().unwrap().to_string())
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen, ["Trees/Tree_01", "Trees/Tree_02"]);
}

#[test]
fn test_unmatched_wildcard_fails_its_step() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = fixtures::tree_catalog(dir.path());
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);

    let raw = fixtures::scene_job(
        2,
        "  object:\n    - name: forest\n      models: {wildcard: {library: Trees, pattern: Palm_*}}",
    );
    let err = Preprocessor::new(&catalog, &schema, &registry)
        .run(&raw)
        .expect_err("No palm trees in the catalog");
    match err {
        PipelineError::Step { path, source, .. } => {
            assert_eq!(path, "/scene/object/0/models");
            assert!(matches!(source, ResolveError::AssetNotFound { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_catalog_enum_rejects_unknown_model() {
    let dir = tempdir().expect("Failed to create temp dir");
    let catalog = fixtures::tree_catalog(dir.path());
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);

    let raw = fixtures::scene_job(1, "  object:\n    - name: one\n      models: Trees/Oak_99");
    let err = Preprocessor::new(&catalog, &schema, &registry)
        .prepare(&raw)
        .expect_err("Oak_99 is not in the catalog");
    assert!(matches!(err, PipelineError::Invalid(_)));

    let raw = fixtures::scene_job(1, "  object:\n    - name: one\n      models: Trees/Rock_01");
    assert!(
        Preprocessor::new(&catalog, &schema, &registry)
            .prepare(&raw)
            .is_ok()
    );
}

#[test]
fn test_gpu_requires_render_hardware() {
    let catalog = Catalog::new();
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);
    let pre = Preprocessor::new(&catalog, &schema, &registry);

    let raw = fixtures::job(
        "general: {steps: 1, seeds: {numpy: 0}, render_device: GPU}\nscene: {}\nsensor: {}\n",
    );
    match pre.prepare(&raw).expect_err("GPU without hardware") {
        PipelineError::Invalid(report) => {
            assert!(report.issues.iter().any(|i| i.path == "/general"
                && i.message == "render_hardware is required when render_device is GPU"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let raw = fixtures::job(
        "general: {steps: 1, seeds: {numpy: 0}, render_device: GPU, render_hardware: OPTIX}\nscene: {}\nsensor: {}\n",
    );
    assert!(pre.prepare(&raw).is_ok());
}

const TEXTURE_JOB: &str = "
general: {steps: 3, seeds: {numpy: 7, textures: 2}}
scene:
  ground:
    - name: floor
      size: 20
      texture: Preprocessed Assets/cracks
sensor: {}
textures:
  noise:
    config: {image_size: [16, 16], bit_depth: 16, num_textures: 2}
    ops:
      - perlin: {octaves: 4, frequency: 2.0}
  cracks:
    config: {image_size: [16, 16], bit_depth: 8, seed: 5}
    ops:
      - random_rectangles:
          num_rectangles: {uniform: [2, 6]}
          avg_width: 4
          std_width: 1
          avg_height: 3
          std_height: 1
      - math_expression: x * noise
      - dilate: {kernel_size: 3}
      - clip: [0.1, 0.9]
";

#[test]
fn test_resolution_is_deterministic() {
    let raw = fixtures::job(TEXTURE_JOB);
    let catalog = Catalog::new();
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);
    let pre = Preprocessor::new(&catalog, &schema, &registry);

    let first = pre.run(&raw).expect("Job resolves");
    let second = pre.run(&raw).expect("Job resolves");
    assert_eq!(first.len(), 3);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.document, b.document);
        for (id, texture) in &a.textures {
            let other = &b.textures[id];
            for (x, y) in texture.instances.iter().zip(other.instances.iter()) {
                assert_eq!(
                    texture.bit_depth.quantize(x),
                    other.bit_depth.quantize(y),
                    "texture {id} differs at step {}",
                    a.step
                );
            }
        }
    }
    assert!(first[0].textures["noise"].is_static);
    assert!(!first[0].textures["cracks"].is_static);
    assert_eq!(first[0].textures["noise"].bit_depth, BitDepth::Sixteen);
}

#[test]
fn test_resolve_step_seed_changes_draws() {
    let raw = fixtures::scene_job(1, "  ground:\n    - name: floor\n      size: {normal: [10, 2]}");
    let document = JobDocument::from_value(raw).expect("Document normalizes");
    let catalog = Catalog::new();

    let a = resolve_step(&document, 0, 1, &catalog).expect("Step resolves");
    let b = resolve_step(&document, 0, 1, &catalog).expect("Step resolves");
    let c = resolve_step(&document, 0, 2, &catalog).expect("Step resolves");
    assert_eq!(a, b);
    assert_ne!(a.value, c.value);
}

#[test]
fn test_preprocess_into_output_directory() {
    let dir = tempdir().expect("Failed to create temp dir");
    let raw = fixtures::job(TEXTURE_JOB);
    let catalog = Catalog::new();
    let registry = fixtures::registry();
    let schema = fixtures::schema(&registry, &catalog);

    let prepared = Preprocessor::new(&catalog, &schema, &registry)
        .prepare(&raw)
        .expect("Job is valid");
    let mut writer = OutputWriter::with_root(dir.path().join("run")).expect("Run dir created");
    assert_eq!(prepared.run_into(&mut writer).expect("Steps written"), 3);
    let catalog_path = writer.finish(prepared.catalog()).expect("Catalog written");

    let run = dir.path().join("run");
    for step in 0..3 {
        assert!(run.join(format!("step_{step}.yaml")).is_file());
        assert!(run.join(format!("textures/cracks_0_step_{step}.png")).is_file());
    }
    assert!(run.join("textures/noise_0.png").is_file());
    assert!(run.join("textures/noise_1.png").is_file());

    let step0 = sceneforge_shared::load_yaml_value(&run.join("step_0.yaml"), 1 << 20)
        .expect("Step document reads back");
    let ground_texture = &step0["scene"]["ground"][0]["texture"][0];
    assert_eq!(
        ground_texture.as_str().unwrap(),
        run.join("textures/cracks_0_step_0.png").display().to_string()
    );

    let written = Catalog::load(&catalog_path).expect("Catalog reads back");
    let noise = written.get("Preprocessed Assets/noise").expect("noise entry");
    assert_eq!(noise.files["filepath"].len(), 2);
}
