use celview_common::{Color, Mat4, Vec3};
use celview_scene::{AggregateModel, Scene, primitives};

/// A small scene for smoke runs: a cube with one color per face, two white
/// cubes sharing one model, and a floor made of a scaled quad.
pub fn demo_scene() -> Scene {
    let mut scene = Scene::new();
    scene.add(
        primitives::cube([
            Color::RED,
            Color::GREEN,
            Color::BLUE,
            Color::ASUKA_RED,
            Color::WHITE,
            Color::AYANAMI_BLUE,
        ]),
        Mat4::IDENTITY,
    );

    let white = scene.add_model(primitives::white_cube());
    for x in [-2.5, 2.5] {
        scene
            .add_instance(
                white,
                Mat4::from_scale_rotation_translation(
                    Vec3::splat(0.75),
                    Default::default(),
                    Vec3::new(x, 0.0, 0.0),
                ),
            )
            .expect("white cube is in this arena");
    }

    let floor = AggregateModel::new().with_part(
        primitives::quad(Color::rgb(0.4, 0.4, 0.4)),
        Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2),
    );
    scene.add(
        floor,
        Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)) * Mat4::from_scale(Vec3::splat(8.0)),
    );
    scene
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_scene_shares_the_white_cube() {
        let scene = demo_scene();
        assert_eq!(scene.instance_count(), 4);
        assert_eq!(scene.arena().len(), 3);
        assert_eq!(scene.get_models()[1].model, scene.get_models()[2].model);
    }
}
