use std::collections::HashMap;

use crate::model::{SpotType, VehicleType};

/// Which spot types each vehicle category may be assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPolicy {
    allowed: HashMap<VehicleType, Vec<SpotType>>,
}

impl AllocationPolicy {
    pub fn new(allowed: HashMap<VehicleType, Vec<SpotType>>) -> Self {
        let allowed = allowed
            .into_iter()
            .map(|(kind, mut types)| {
                types.sort_by_key(|t| *t as u8);
                types.dedup();
                (kind, types)
            })
            .collect();
        Self { allowed }
    }

    /// Unknown categories map to the empty set.
    pub fn permitted(&self, kind: VehicleType) -> &[SpotType] {
        self.allowed.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn permits(&self, kind: VehicleType, spot: SpotType) -> bool {
        self.permitted(kind).contains(&spot)
    }
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self::new(HashMap::from([
            (VehicleType::Car, vec![SpotType::Compact, SpotType::Large]),
            (VehicleType::Bike, vec![SpotType::Bike]),
            (VehicleType::Truck, vec![SpotType::Large]),
        ]))
    }
}
