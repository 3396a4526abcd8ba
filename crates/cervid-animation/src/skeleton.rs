use std::collections::HashMap;

use cervid_core::{CervidError, Result, Transform};
use glam::{Mat4, Quat, Vec3};

use crate::hierarchy::{bone_name, BoneHierarchy};

pub struct Bone {
    pub name: String,
    /// Inverse bind matrix: model space to bone space in the rest pose.
    pub offset: Mat4,
    /// Pose adjustment applied on top of the hierarchy's rest transform.
    pub local_transformation: Transform,
    /// Skinning matrix produced by [`Skeleton::update_final_transforms`].
    pub final_transformation: Mat4,
}

/// Skinned bone table of a mesh, addressed by processed bone name.
pub struct Skeleton {
    pub bones: Vec<Bone>,
    pub bone_names: HashMap<String, usize>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self {
            bones: Vec::new(),
            bone_names: HashMap::new(),
        }
    }

    /// Registers a bone under the processed form of its raw node name and
    /// returns its slot.
    pub fn add_bone(&mut self, name: &str, offset: Mat4) -> usize {
        let name = bone_name(name).to_string();
        let index = self.bones.len();
        self.bone_names.insert(name.clone(), index);
        self.bones.push(Bone {
            name,
            offset,
            local_transformation: Transform::IDENTITY,
            final_transformation: Mat4::IDENTITY,
        });
        index
    }

    /// Registers every hierarchy node whose processed name is listed in
    /// `names`, deriving each
    /// inverse bind matrix from the rest pose.
    pub fn from_hierarchy(hierarchy: &BoneHierarchy, names: &[&str]) -> Result<Self> {
        let world = hierarchy.world_transforms();
        let mut skeleton = Self::new();
        for name in names {
            let index = hierarchy
                .find(name)
                .ok_or_else(|| CervidError::BoneNotFound(name.to_string()))?;
            skeleton.add_bone(&hierarchy.nodes()[index].name, world[index].inverse());
        }
        Ok(skeleton)
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bone_names.get(name).copied()
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bone_index(name).map(|i| &self.bones[i])
    }

    fn bone_mut(&mut self, name: &str) -> Result<&mut Bone> {
        match self.bone_names.get(name) {
            Some(&index) => Ok(&mut self.bones[index]),
            None => Err(CervidError::BoneNotFound(name.to_string())),
        }
    }

    /// Pre-multiplies the bone's pose adjustment by `mat`.
    pub fn apply_matrix(&mut self, name: &str, mat: Mat4) -> Result<()> {
        let bone = self.bone_mut(name)?;
        bone.local_transformation = Transform::from(mat * bone.local_transformation.to_matrix());
        Ok(())
    }

    pub fn apply_translation(&mut self, name: &str, translation: Vec3) -> Result<()> {
        self.apply_matrix(name, Mat4::from_translation(translation))
    }

    pub fn apply_rotation_x(&mut self, name: &str, degrees: f32) -> Result<()> {
        self.apply_matrix(name, Mat4::from_rotation_x(degrees.to_radians()))
    }

    pub fn apply_rotation_y(&mut self, name: &str, degrees: f32) -> Result<()> {
        self.apply_matrix(name, Mat4::from_rotation_y(degrees.to_radians()))
    }

    pub fn apply_rotation_z(&mut self, name: &str, degrees: f32) -> Result<()> {
        self.apply_matrix(name, Mat4::from_rotation_z(degrees.to_radians()))
    }

    pub fn apply_scaling(&mut self, name: &str, scale: Vec3) -> Result<()> {
        self.apply_matrix(name, Mat4::from_scale(scale))
    }

    pub fn restore_identity(&mut self, name: &str) -> Result<()> {
        self.bone_mut(name)?.local_transformation = Transform::IDENTITY;
        Ok(())
    }

    /// Replaces the pose adjustment with a pure rotation.
    pub fn set_local_rotation(&mut self, name: &str, rotation: Quat) -> Result<()> {
        self.bone_mut(name)?.local_transformation = Transform::from_rotation(rotation);
        Ok(())
    }

    /// Walks the hierarchy from the root and refreshes every bone's
    /// skinning matrix from the rest transforms and pose adjustments.
    pub fn update_final_transforms(&mut self, hierarchy: &BoneHierarchy) {
        let global_inverse = hierarchy.global_inverse();
        let mut globals = vec![Mat4::IDENTITY; hierarchy.len()];

        for (i, node) in hierarchy.nodes().iter().enumerate() {
            let parent_matrix = node.parent.map(|p| globals[p]).unwrap_or(Mat4::IDENTITY);
            let mut global = parent_matrix * node.transform;

            if let Some(&index) = self.bone_names.get(node.bone_name()) {
                let bone = &mut self.bones[index];
                global = global * bone.local_transformation.to_matrix();
                bone.final_transformation = global_inverse * global * bone.offset;
            }

            globals[i] = global;
        }
    }

    /// Skinning matrices in bone slot order.
    pub fn bone_matrices(&self) -> Vec<Mat4> {
        self.bones.iter().map(|b| b.final_transformation).collect()
    }

    /// Bone names indented with one tab per hierarchy depth; nodes that are
    /// not skinned bones are left out.
    pub fn hierarchy_outline(&self, hierarchy: &BoneHierarchy) -> Vec<String> {
        hierarchy
            .depth_first()
            .into_iter()
            .filter_map(|(index, depth)| {
                let name = hierarchy.nodes()[index].bone_name();
                self.bone_names
                    .contains_key(name)
                    .then(|| format!("{}{}", "\t".repeat(depth), name))
            })
            .collect()
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw bytes of a skinning palette, ready for a GPU upload.
pub fn palette_bytes(matrices: &[Mat4]) -> &[u8] {
    bytemuck::cast_slice(matrices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> (BoneHierarchy, Skeleton) {
        let mut h = BoneHierarchy::new();
        let root = h.add_node("Scene", None, Mat4::IDENTITY).unwrap();
        let body = h
            .add_node("Deer_body", Some(root), Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        let helper = h.add_node("Deer_helper", Some(body), Mat4::IDENTITY).unwrap();
        h.add_node("Deer_neck", Some(helper), Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        let skeleton = Skeleton::from_hierarchy(&h, &["body", "neck"]).unwrap();
        (h, skeleton)
    }

    #[test]
    fn test_unknown_bone_is_reported() {
        let (_, mut skeleton) = sample();
        let err = skeleton.apply_rotation_z("tail", 10.0).unwrap_err();
        assert!(matches!(err, CervidError::BoneNotFound(name) if name == "tail"));
        assert!(skeleton.restore_identity("tail").is_err());
    }

    #[test]
    fn test_names_are_processed() {
        let (_, skeleton) = sample();
        assert_eq!(skeleton.bone_index("body"), Some(0));
        assert_eq!(skeleton.bone_index("Deer_body"), None);
    }

    #[test]
    fn test_rotations_accumulate_and_restore() {
        let (_, mut skeleton) = sample();
        skeleton.apply_rotation_z("neck", 30.0).unwrap();
        skeleton.apply_rotation_z("neck", 15.0).unwrap();
        let rotation = skeleton.bone("neck").unwrap().local_transformation.rotation;
        assert!(rotation.abs_diff_eq(Quat::from_rotation_z(45f32.to_radians()), 1e-5));

        skeleton.restore_identity("neck").unwrap();
        assert_eq!(
            skeleton.bone("neck").unwrap().local_transformation,
            Transform::IDENTITY
        );
    }

    #[test]
    fn test_set_local_rotation_clears_translation() {
        let (_, mut skeleton) = sample();
        skeleton.apply_translation("neck", Vec3::X).unwrap();
        skeleton.apply_scaling("neck", Vec3::splat(2.0)).unwrap();
        skeleton
            .set_local_rotation("neck", Quat::from_rotation_y(0.3))
            .unwrap();
        let local = skeleton.bone("neck").unwrap().local_transformation;
        assert_eq!(local.position, Vec3::ZERO);
        assert_eq!(local.scale, Vec3::ONE);
    }

    #[test]
    fn test_rest_pose_gives_identity_palette() {
        let (h, mut skeleton) = sample();
        skeleton.update_final_transforms(&h);
        for m in skeleton.bone_matrices() {
            assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn test_parent_pose_moves_child() {
        let (h, mut skeleton) = sample();
        skeleton.apply_rotation_z("body", 90.0).unwrap();
        skeleton.update_final_transforms(&h);

        // A vertex at the rest neck origin swings around the body joint.
        let neck = skeleton.bone("neck").unwrap().final_transformation;
        let moved = neck.transform_point3(Vec3::new(0.0, 2.0, 0.0));
        assert!(moved.abs_diff_eq(Vec3::new(-1.0, 1.0, 0.0), 1e-5), "{moved:?}");
    }

    #[test]
    fn test_palette_bytes() {
        let (h, mut skeleton) = sample();
        skeleton.update_final_transforms(&h);
        let matrices = skeleton.bone_matrices();
        assert_eq!(palette_bytes(&matrices).len(), 2 * 64);
    }

    #[test]
    fn test_hierarchy_outline_skips_helpers() {
        let (h, skeleton) = sample();
        assert_eq!(
            skeleton.hierarchy_outline(&h),
            vec!["\tbody".to_string(), "\t\t\tneck".to_string()]
        );
    }
}
