use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use super::{OutputPlugin, PluginFactory, PluginKind, PluginRegistry, ScenePlugin};
use crate::document::DocPath;
use crate::error::{ConfigError, PipelineError};
use crate::preprocess::{ResolvedStep, StepSink};

/// Drives plugin runtimes with resolved steps.
///
/// One runtime instance exists per plugin config, keyed by the config's
/// document path. Scene and sensor plugins are loaded with the config of the
/// first step they see and configured every step; output and postprocessing
/// plugins generate output every step.
pub struct PluginHost<'r> {
    registry: &'r PluginRegistry,
    scene: IndexMap<String, Box<dyn ScenePlugin>>,
    outputs: IndexMap<String, Box<dyn OutputPlugin>>,
}

impl<'r> PluginHost<'r> {
    pub fn new(registry: &'r PluginRegistry) -> Self {
        Self {
            registry,
            scene: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    /// Number of live runtime instances.
    pub fn instances(&self) -> usize {
        self.scene.len() + self.outputs.len()
    }

    pub fn apply(&mut self, step: &ResolvedStep) -> Result<(), PipelineError> {
        for kind in [PluginKind::Scene, PluginKind::Sensor, PluginKind::Postprocessing] {
            let Some(section) = step.document.get(kind.section()).and_then(Value::as_object)
            else {
                continue;
            };
            let section_path = DocPath::root().key(kind.section());
            for (id, configs) in section {
                let path = section_path.key(id);
                for (i, config) in config_list(configs).iter().enumerate() {
                    let config_path = path.index(i);
                    self.run(kind, id, config, &config_path, step.step)?;
                    if kind == PluginKind::Sensor
                        && let Some(outputs) = config.get("outputs").and_then(Value::as_object)
                    {
                        let outputs_path = config_path.key("outputs");
                        for (output_id, output_configs) in outputs {
                            let list = config_list(output_configs);
                            for (j, output_config) in list.iter().enumerate() {
                                let output_path = outputs_path.key(output_id).index(j);
                                self.run(
                                    PluginKind::Output,
                                    output_id,
                                    output_config,
                                    &output_path,
                                    step.step,
                                )?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn run(
        &mut self,
        kind: PluginKind,
        id: &str,
        config: &Value,
        path: &DocPath,
        step: usize,
    ) -> Result<(), PipelineError> {
        let registry = self.registry;
        let descriptor = registry.get(kind, id).ok_or_else(|| {
            ConfigError::new(path.pointer(), format!("unknown {kind} plugin '{id}'"))
        })?;
        let failed = |e: anyhow::Error| PipelineError::Plugin {
            plugin: id.to_string(),
            step,
            message: format!("{e:#}"),
        };
        let key = path.pointer();

        match &descriptor.factory {
            None => trace!(plugin = %id, "no runtime attached"),
            Some(PluginFactory::Scene(factory)) => {
                if !self.scene.contains_key(&key) {
                    let mut plugin = factory();
                    plugin.load(config).map_err(failed)?;
                    debug!(plugin = %id, path = %key, "loaded plugin");
                    self.scene.insert(key.clone(), plugin);
                }
                if let Some(plugin) = self.scene.get_mut(&key) {
                    plugin.configure(config, step).map_err(failed)?;
                }
            }
            Some(PluginFactory::Output(factory)) => {
                let plugin = self.outputs.entry(key).or_insert_with(|| factory());
                plugin.generate_output(config, step).map_err(failed)?;
            }
        }
        Ok(())
    }
}

impl StepSink for PluginHost<'_> {
    fn accept(&mut self, step: &ResolvedStep) -> Result<(), PipelineError> {
        self.apply(step)
    }
}

/// Plugin sections hold a list of configs; a lone mapping counts as one.
fn config_list(configs: &Value) -> Vec<&Value> {
    match configs {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginDescriptor;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        log: Log,
    }

    impl ScenePlugin for Recorder {
        fn load(&mut self, config: &Value) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("load {}", config["name"]));
            Ok(())
        }

        fn configure(&mut self, config: &Value, step: usize) -> anyhow::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("configure {} {step}", config["name"]));
            Ok(())
        }
    }

    impl OutputPlugin for Recorder {
        fn generate_output(&mut self, config: &Value, step: usize) -> anyhow::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("output {} {step}", config["id"]));
            Ok(())
        }
    }

    fn registry(log: &Log) -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        let scene_log = log.clone();
        registry
            .register(
                PluginDescriptor::new(PluginKind::Sensor, "camera").with_scene_factory(move || {
                    Box::new(Recorder {
                        log: scene_log.clone(),
                    })
                }),
            )
            .unwrap();
        let output_log = log.clone();
        registry
            .register(
                PluginDescriptor::new(PluginKind::Output, "rgb").with_output_factory(move || {
                    Box::new(Recorder {
                        log: output_log.clone(),
                    })
                }),
            )
            .unwrap();
        registry
            .register(PluginDescriptor::new(PluginKind::Scene, "ground"))
            .unwrap();
        registry
    }

    fn step(n: usize) -> ResolvedStep {
        ResolvedStep {
            step: n,
            document: json!({
                "scene": {"ground": [{"name": "floor"}]},
                "sensor": {"camera": [{"name": "cam", "outputs": {"rgb": [{"id": "main"}]}}]},
            }),
            globals: IndexMap::new(),
            textures: IndexMap::new(),
        }
    }

    #[test]
    fn test_load_once_configure_every_step() {
        let log: Log = Arc::default();
        let registry = registry(&log);
        let mut host = PluginHost::new(&registry);
        host.accept(&step(0)).unwrap();
        host.accept(&step(1)).unwrap();
        assert_eq!(host.instances(), 2);
        assert_eq!(
            *log.lock().unwrap(),
            [
                "load \"cam\"",
                "configure \"cam\" 0",
                "output \"main\" 0",
                "configure \"cam\" 1",
                "output \"main\" 1",
            ]
        );
    }

    #[test]
    fn test_unknown_plugin_is_a_config_error() {
        let log: Log = Arc::default();
        let registry = registry(&log);
        let mut host = PluginHost::new(&registry);
        let mut bad = step(0);
        bad.document["scene"]["spaceship"] = json!([{}]);
        let err = host.accept(&bad).unwrap_err();
        match err {
            PipelineError::Config(err) => assert_eq!(err.path, "/scene/spaceship/0"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
