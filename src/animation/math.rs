//! Small interpolation helpers shared by the animation layers.

/// Linear interpolation. `t` is clamped to `[0, 1]` so a long frame never
/// overshoots the target.
pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

/// Hermite smoothstep of `x` over `[0, 1]`.
pub fn smoothstep(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

/// Two sines at non-harmonic frequencies so idle motion does not visibly loop.
pub fn natural_sine(t: f32, speed: f32) -> f32 {
    ((t * speed).sin() + (t * speed * 1.3).sin() * 0.5) / 1.5
}
