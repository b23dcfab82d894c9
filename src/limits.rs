/// Upper bounds enforced when a facility is configured.
pub const MAX_FLOORS: usize = 256;
pub const MAX_SPOTS_PER_FLOOR: usize = 10_000;
pub const MAX_SPOT_ID_LEN: usize = 64;
pub const MAX_PLATE_LEN: usize = 32;
