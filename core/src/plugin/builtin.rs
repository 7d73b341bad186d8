use super::{PluginDescriptor, PluginError, PluginKind};

const BUILTINS: &[(PluginKind, &str, &str)] = &[
    (PluginKind::Scene, "object", include_str!("schemas/object.yaml")),
    (PluginKind::Scene, "ground", include_str!("schemas/ground.yaml")),
    (PluginKind::Scene, "environment", include_str!("schemas/environment.yaml")),
    (PluginKind::Scene, "scatter", include_str!("schemas/scatter.yaml")),
    (PluginKind::Scene, "simulated_scatter", include_str!("schemas/simulated_scatter.yaml")),
    (PluginKind::Scene, "crop", include_str!("schemas/crop.yaml")),
    (PluginKind::Sensor, "camera", include_str!("schemas/camera.yaml")),
    (PluginKind::Output, "rgb", include_str!("schemas/rgb.yaml")),
    (PluginKind::Output, "pixel_annotation", include_str!("schemas/pixel_annotation.yaml")),
    (PluginKind::Output, "keypoints", include_str!("schemas/keypoints.yaml")),
    (PluginKind::Output, "object_positions", include_str!("schemas/object_positions.yaml")),
    (PluginKind::Postprocessing, "bounding_boxes", include_str!("schemas/bounding_boxes.yaml")),
];

/// Descriptors of the plugins shipped with sceneforge. They carry schema
/// fragments only; renderers attach runtimes with
/// [`PluginRegistry::replace`](super::PluginRegistry::replace).
pub(super) fn descriptors() -> Result<Vec<PluginDescriptor>, PluginError> {
    BUILTINS
        .iter()
        .map(|(kind, id, source)| {
            let schema = sceneforge_shared::parse_yaml_value(source).map_err(|e| {
                PluginError::BuiltinSchema {
                    kind: *kind,
                    id: id.to_string(),
                    message: format!("{e:#}"),
                }
            })?;
            Ok(PluginDescriptor::new(*kind, *id).with_schema(schema))
        })
        .collect()
}
