/// Built-in lit shader. Entry points `VS` and `PS`.
///
/// Group 0 holds the per-object record bound to the vertex stage, group 1 the
/// per-frame light bound to the pixel stage. Struct layouts match
/// `celview_render::constants`.
pub const LIT_SHADER: &str = r#"
struct PerObject {
    wvp: mat4x4<f32>,
    world: mat4x4<f32>,
};

struct Light {
    dir: vec3<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
};

struct PerFrame {
    light: Light,
};

@group(0) @binding(0)
var<uniform> object: PerObject;

@group(1) @binding(0)
var<uniform> frame: PerFrame;

struct VertexInput {
    @location(0) position: vec4<f32>,
    @location(1) color: vec4<f32>,
    @location(2) normal: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) world_normal: vec3<f32>,
};

@vertex
fn VS(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = object.wvp * vertex.position;
    out.world_normal = (object.world * vec4<f32>(vertex.normal, 0.0)).xyz;
    out.color = vertex.color;
    return out;
}

@fragment
fn PS(input: VertexOutput) -> @location(0) vec4<f32> {
    var n = vec3<f32>(0.0, 0.0, 0.0);
    if (length(input.world_normal) > 1e-6) {
        n = normalize(input.world_normal);
    }
    let l = normalize(frame.light.dir);
    let diffuse = saturate(dot(l, n));
    var color = input.color * frame.light.ambient + diffuse * frame.light.diffuse * input.color;
    color.a = input.color.a;
    return color;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_declares_both_entry_points() {
        assert!(LIT_SHADER.contains("fn VS("));
        assert!(LIT_SHADER.contains("fn PS("));
    }

    #[test]
    fn shader_inputs_match_vertex_record() {
        for (loc, ty) in [(0, "vec4<f32>"), (1, "vec4<f32>"), (2, "vec3<f32>")] {
            assert!(LIT_SHADER.contains(&format!("@location({loc})")));
            assert!(LIT_SHADER.contains(ty));
        }
    }
}
