//! Surface materials and the pairwise contact-material table

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifies a [`Material`] registered in a [`MaterialTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// The material every table starts with
    pub const DEFAULT: Self = Self(0);
}

/// An opaque surface tag with optional per-material coefficients.
///
/// When both materials in a contact define a coefficient, the product of
/// the two overrides whatever the contact material says.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub friction: Option<f32>,
    pub restitution: Option<f32>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            friction: None,
            restitution: None,
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = Some(friction);
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = Some(restitution);
        self
    }
}

/// Concrete contact parameters for a pair of materials
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactMaterial {
    pub materials: (MaterialId, MaterialId),
    pub friction: f32,
    pub restitution: f32,
    /// Contacts approaching slower than this (m/s) do not bounce
    #[serde(default = "default_restitution_threshold")]
    pub restitution_threshold: f32,
    pub contact_equation_stiffness: f32,
    pub contact_equation_relaxation: f32,
    pub friction_equation_stiffness: f32,
    pub friction_equation_relaxation: f32,
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self::new(MaterialId::DEFAULT, MaterialId::DEFAULT)
    }
}

impl ContactMaterial {
    /// Friction 0.3, restitution 0 above 1 m/s, SPOOK stiffness 1e7 and
    /// relaxation 3
    pub fn new(a: MaterialId, b: MaterialId) -> Self {
        Self {
            materials: (a, b),
            friction: 0.3,
            restitution: 0.0,
            restitution_threshold: default_restitution_threshold(),
            contact_equation_stiffness: 1e7,
            contact_equation_relaxation: 3.0,
            friction_equation_stiffness: 1e7,
            friction_equation_relaxation: 3.0,
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_restitution_threshold(mut self, threshold: f32) -> Self {
        self.restitution_threshold = threshold;
        self
    }

    /// Restitution for a contact approaching at `approach_speed`
    #[inline]
    pub fn effective_restitution(&self, restitution: f32, approach_speed: f32) -> f32 {
        if approach_speed > self.restitution_threshold {
            restitution
        } else {
            0.0
        }
    }

    pub fn with_contact_spook(mut self, stiffness: f32, relaxation: f32) -> Self {
        self.contact_equation_stiffness = stiffness;
        self.contact_equation_relaxation = relaxation;
        self
    }

    pub fn with_friction_spook(mut self, stiffness: f32, relaxation: f32) -> Self {
        self.friction_equation_stiffness = stiffness;
        self.friction_equation_relaxation = relaxation;
        self
    }
}

fn default_restitution_threshold() -> f32 {
    1.0
}

fn pair_key(a: MaterialId, b: MaterialId) -> (MaterialId, MaterialId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Registered materials plus the unordered-pair contact-material lookup
#[derive(Debug, Clone)]
pub struct MaterialTable {
    materials: Vec<Material>,
    contact_materials: HashMap<(MaterialId, MaterialId), ContactMaterial>,
    default_contact_material: ContactMaterial,
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self::new(ContactMaterial::default())
    }
}

impl MaterialTable {
    pub fn new(default_contact_material: ContactMaterial) -> Self {
        Self {
            materials: vec![Material::new("default")],
            contact_materials: HashMap::new(),
            default_contact_material,
        }
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId((self.materials.len() - 1) as u32)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    /// Registers a contact material. Adding the same pair again replaces
    /// the previous parameters.
    pub fn add_contact_material(&mut self, contact_material: ContactMaterial) {
        let (a, b) = contact_material.materials;
        if self
            .contact_materials
            .insert(pair_key(a, b), contact_material)
            .is_some()
        {
            log::debug!("replaced contact material for {:?}/{:?}", a, b);
        }
    }

    pub fn remove_contact_material(&mut self, a: MaterialId, b: MaterialId) -> Option<ContactMaterial> {
        self.contact_materials.remove(&pair_key(a, b))
    }

    pub fn contact_material(&self, a: MaterialId, b: MaterialId) -> Option<&ContactMaterial> {
        self.contact_materials.get(&pair_key(a, b))
    }

    pub fn default_contact_material(&self) -> &ContactMaterial {
        &self.default_contact_material
    }

    pub fn set_default_contact_material(&mut self, contact_material: ContactMaterial) {
        self.default_contact_material = contact_material;
    }

    /// Picks the contact material for two optionally-tagged surfaces,
    /// falling back to the world default.
    pub fn resolve(&self, a: Option<MaterialId>, b: Option<MaterialId>) -> Option<&ContactMaterial> {
        match (a, b) {
            (Some(a), Some(b)) => self.contact_material(a, b),
            _ => None,
        }
    }

    /// Product of both materials' friction when both define one
    pub fn combined_friction(&self, a: Option<MaterialId>, b: Option<MaterialId>) -> Option<f32> {
        let a = self.material(a?)?.friction?;
        let b = self.material(b?)?.friction?;
        (a >= 0.0 && b >= 0.0).then_some(a * b)
    }

    /// Product of both materials' restitution when both define one
    pub fn combined_restitution(&self, a: Option<MaterialId>, b: Option<MaterialId>) -> Option<f32> {
        let a = self.material(a?)?.restitution?;
        let b = self.material(b?)?.restitution?;
        (a >= 0.0 && b >= 0.0).then_some(a * b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_unordered() {
        let mut table = MaterialTable::default();
        let ice = table.add_material(Material::new("ice"));
        let rubber = table.add_material(Material::new("rubber"));
        table.add_contact_material(ContactMaterial::new(ice, rubber).with_friction(0.05));

        assert_eq!(table.contact_material(rubber, ice).map(|cm| cm.friction), Some(0.05));
        assert!(table.contact_material(ice, ice).is_none());
    }

    #[test]
    fn test_re_adding_pair_replaces() {
        let mut table = MaterialTable::default();
        let a = table.add_material(Material::new("a"));
        table.add_contact_material(ContactMaterial::new(a, a).with_restitution(0.2));
        table.add_contact_material(ContactMaterial::new(a, a).with_restitution(0.7));
        assert_eq!(table.contact_material(a, a).map(|cm| cm.restitution), Some(0.7));
    }

    #[test]
    fn test_combined_coefficients_need_both_sides() {
        let mut table = MaterialTable::default();
        let a = table.add_material(Material::new("a").with_friction(0.5).with_restitution(0.4));
        let b = table.add_material(Material::new("b").with_friction(0.4));

        assert_eq!(table.combined_friction(Some(a), Some(b)), Some(0.2));
        assert_eq!(table.combined_restitution(Some(a), Some(b)), None);
        assert_eq!(table.combined_friction(Some(a), None), None);
    }

    #[test]
    fn test_default_fallback() {
        let table = MaterialTable::default();
        assert!(table.resolve(None, Some(MaterialId::DEFAULT)).is_none());
        assert_eq!(table.default_contact_material().friction, 0.3);
        assert_eq!(table.default_contact_material().restitution, 0.0);
    }

    #[test]
    fn test_restitution_cutoff() {
        let cm = ContactMaterial::default().with_restitution(0.8);
        assert_eq!(cm.effective_restitution(cm.restitution, 3.0), 0.8);
        assert_eq!(cm.effective_restitution(cm.restitution, 0.2), 0.0);
        assert_eq!(cm.effective_restitution(cm.restitution, -3.0), 0.0);

        let lively = cm.with_restitution_threshold(0.0);
        assert_eq!(lively.effective_restitution(lively.restitution, 0.2), 0.8);
    }

    #[test]
    fn test_threshold_defaults_when_deserialized() {
        let mut json = serde_json::to_value(ContactMaterial::default()).unwrap();
        json.as_object_mut().unwrap().remove("restitution_threshold");
        let cm: ContactMaterial = serde_json::from_value(json).unwrap();
        assert_eq!(cm.restitution_threshold, 1.0);
    }
}
