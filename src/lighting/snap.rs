/// Discrete brightness levels the lighting actuator accepts, in the order
/// they are tested when snapping.
pub const LIGHT_LEVELS: [u8; 5] = [0, 25, 50, 75, 100];

/// Snap a continuous luminosity value to the nearest member of
/// [`LIGHT_LEVELS`].
///
/// Levels are tested in ascending order and only a strictly smaller distance
/// replaces the current best, so a value exactly between two levels resolves
/// to the lower one (`12.5 → 0`, `37.5 → 25`, `62.5 → 50`, `87.5 → 75`).
pub fn snap(x: f64) -> u8 {
    if x == 0.0 {
        return 0;
    }

    let mut best = LIGHT_LEVELS[0];
    let mut best_distance = (x - f64::from(best)).abs();

    for &level in &LIGHT_LEVELS[1..] {
        let distance = (x - f64::from(level)).abs();
        if distance < best_distance {
            best = level;
            best_distance = distance;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_snaps_to_zero() {
        assert_eq!(snap(0.0), 0);
    }

    #[test]
    fn hundred_snaps_to_hundred() {
        assert_eq!(snap(100.0), 100);
    }

    #[test]
    fn sixty_two_is_closer_to_fifty() {
        assert_eq!(snap(62.0), 50);
    }

    #[test]
    fn midpoints_resolve_to_lower_level() {
        assert_eq!(snap(12.5), 0);
        assert_eq!(snap(37.5), 25);
        assert_eq!(snap(62.5), 50);
        assert_eq!(snap(87.5), 75);
    }

    #[test]
    fn just_past_midpoint_goes_up() {
        assert_eq!(snap(12.6), 25);
        assert_eq!(snap(87.6), 100);
    }

    #[test]
    fn out_of_range_values_clamp_to_extremes() {
        assert_eq!(snap(-40.0), 0);
        assert_eq!(snap(950.0), 100);
    }

    #[test]
    fn every_value_in_range_maps_to_a_level() {
        for tenth in 0..=1000 {
            let x = f64::from(tenth) / 10.0;
            assert!(LIGHT_LEVELS.contains(&snap(x)), "snap({x}) left the level set");
        }
    }
}
