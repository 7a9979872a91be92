//! Scene setup from configuration.

use anyhow::{Context, Result};
use glam::Vec3;
use tracing::debug;

use vkpipe_core::config::{CameraConfig, CameraStrategy, ObjectConfig, ObjectKindConfig, SceneConfig};
use vkpipe_renderer::{ObjectDesc, ObjectKind};
use vkpipe_resources::builtin;
use vkpipe_scene::{Camera, CameraRig, FlyCamera, OrbitCamera, Projection, Transform};

/// Builds the configured camera rig with a projection for the given window size.
///
/// A zero width or height is treated as 1 so the aspect ratio stays finite.
pub fn build_camera(config: &CameraConfig, width: u32, height: u32) -> Camera {
    let position = Vec3::from_array(config.position);
    let target = Vec3::from_array(config.target);

    let rig = match config.strategy {
        CameraStrategy::Orbit => CameraRig::Orbit(OrbitCamera::looking_at(
            position,
            target,
            config.move_speed,
            config.rotate_speed,
        )),
        CameraStrategy::Fly => CameraRig::Fly(FlyCamera::looking_at(
            position,
            target,
            config.move_speed,
            config.rotate_speed,
        )),
    };

    let aspect = width.max(1) as f32 / height.max(1) as f32;
    let projection = Projection::new(config.fov_degrees, aspect, config.near, config.far);
    debug!("Camera: {} at {:?}", rig.name(), position);
    Camera::new(rig, projection)
}

/// Resolves the parts of one object and validates the result.
fn object_desc(config: &ObjectConfig) -> Result<ObjectDesc> {
    let kind = match config.kind {
        ObjectKindConfig::Renderable => ObjectKind::Renderable,
        ObjectKindConfig::PointLight => ObjectKind::PointLight {
            intensity: config.intensity,
        },
    };

    let transform = Transform::new()
        .with_position(Vec3::from_array(config.position))
        .with_rotation(Vec3::from_array(config.rotation))
        .with_scale(Vec3::from_array(config.scale));

    let mut desc = ObjectDesc::new(config.name.clone(), kind)
        .with_transform(transform)
        .with_speeds(config.move_speed, config.rotate_speed);

    for part in &config.parts {
        let mesh = builtin::mesh(&part.mesh)
            .with_context(|| format!("object '{}': mesh '{}'", config.name, part.mesh))?;
        let texture = builtin::texture(&part.texture)
            .with_context(|| format!("object '{}': texture '{}'", config.name, part.texture))?;
        desc = desc.with_part(mesh, texture);
    }

    desc.validate().with_context(|| format!("object '{}'", config.name))?;
    Ok(desc)
}

/// Resolves every configured object into an uploadable description.
pub fn object_descs(config: &SceneConfig) -> Result<Vec<ObjectDesc>> {
    config.objects.iter().map(object_desc).collect()
}

/// Turns `transform` about the world Y axis by `rotate_speed` degrees per second.
pub fn spin(transform: &mut Transform, rotate_speed: f32, dt: f32) {
    if rotate_speed != 0.0 {
        transform.rotate(Vec3::new(0.0, rotate_speed * dt, 0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vkpipe_core::config::PartConfig;

    fn cube_object(name: &str) -> ObjectConfig {
        ObjectConfig {
            name: name.to_string(),
            kind: ObjectKindConfig::Renderable,
            parts: vec![PartConfig {
                mesh: "cube".to_string(),
                texture: "checker".to_string(),
            }],
            position: [1.0, 2.0, 3.0],
            rotation: [0.0, 45.0, 0.0],
            scale: [1.0, 1.0, 1.0],
            intensity: 50.0,
            move_speed: 0.0,
            rotate_speed: 10.0,
        }
    }

    #[test]
    fn test_default_scene_resolves() {
        let descs = object_descs(&SceneConfig::default()).unwrap();
        assert_eq!(descs.len(), 3);
        assert!(
            descs
                .iter()
                .any(|d| matches!(d.kind, ObjectKind::PointLight { .. }))
        );
        assert!(descs.iter().all(|d| !d.parts.is_empty()));
    }

    #[test]
    fn test_object_transform_and_speeds() {
        let desc = object_desc(&cube_object("crate")).unwrap();
        assert_eq!(desc.transform.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(desc.transform.rotation, Vec3::new(0.0, 45.0, 0.0));
        assert_eq!(desc.rotate_speed, 10.0);
        assert_eq!(desc.parts.len(), 1);
    }

    #[test]
    fn test_point_light_keeps_intensity() {
        let mut config = cube_object("lamp");
        config.kind = ObjectKindConfig::PointLight;
        config.intensity = 12.5;
        let desc = object_desc(&config).unwrap();
        assert_eq!(desc.kind, ObjectKind::PointLight { intensity: 12.5 });
    }

    #[test]
    fn test_unknown_mesh_names_object() {
        let mut config = cube_object("oddity");
        config.parts[0].mesh = "teapot".to_string();
        let err = object_desc(&config).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("oddity"), "{message}");
        assert!(message.contains("teapot"), "{message}");
    }

    #[test]
    fn test_spin_rotates_about_y() {
        let mut transform = Transform::new();
        spin(&mut transform, 90.0, 0.5);
        assert!((transform.rotation.y - 45.0).abs() < 1e-4);
        assert_eq!(transform.rotation.x, 0.0);

        spin(&mut transform, 0.0, 10.0);
        assert!((transform.rotation.y - 45.0).abs() < 1e-4);
    }

    #[test]
    fn test_build_camera_strategies() {
        let mut config = CameraConfig::default();
        let orbit = build_camera(&config, 1280, 720);
        assert!((orbit.position() - Vec3::from_array(config.position)).length() < 1e-3);

        config.strategy = CameraStrategy::Fly;
        let fly = build_camera(&config, 0, 0);
        assert_eq!(fly.position(), Vec3::from_array(config.position));
    }
}
