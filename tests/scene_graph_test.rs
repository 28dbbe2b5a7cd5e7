use std::f32::consts::FRAC_PI_2;

use iveri_ngin::{
    Matrix4, SquareMatrix, Vector3,
    camera::{Camera, Projection},
    data_structures::{
        entity::{Light, Material, Mesh},
        geometry::GeometryBuffer,
        scene_graph::{ChildPolicy, Scene},
    },
    errors::{DegenerateTransform, Error, TreeError},
    render::{RecordingBackend, Submission, VertexAttribute},
};

use crate::common::test_utils::{assert_vec3_eq, triangle};

mod common;

fn named_mesh(name: &str) -> Mesh {
    Mesh::with_material(
        triangle(),
        Material {
            name: name.to_string(),
            ..Default::default()
        },
    )
}

fn mesh_names(backend: &RecordingBackend) -> Vec<String> {
    backend
        .meshes()
        .filter_map(|submission| match submission {
            Submission::Mesh { material, .. } => Some(material.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn world_position_composes_parent_translation() {
    let mut scene = Scene::new();
    let a = scene.create_child(scene.root()).unwrap();
    let b = scene.create_child(a).unwrap();
    scene.get_mut(a).unwrap().set_translation(Vector3::new(1.0, 0.0, 0.0));
    scene.get_mut(b).unwrap().set_translation(Vector3::new(0.0, 2.0, 0.0));

    scene.update_world_matrices(&Matrix4::identity()).unwrap();
    assert_vec3_eq(scene.node(b).unwrap().world_position(), [1.0, 2.0, 0.0]);
    assert_vec3_eq(scene.compose_world(b).unwrap().w.truncate(), [1.0, 2.0, 0.0]);
}

#[test]
fn parent_rotation_applies_to_child_translation() {
    let mut scene = Scene::new();
    let pivot = scene.create_child(scene.root()).unwrap();
    let arm = scene.create_child(pivot).unwrap();
    scene.get_mut(pivot).unwrap().rotate(Vector3::new(0.0, 0.0, FRAC_PI_2));
    scene.get_mut(arm).unwrap().translate(Vector3::new(1.0, 0.0, 0.0));

    scene.update_world_matrices(&Matrix4::identity()).unwrap();
    assert_vec3_eq(scene.node(arm).unwrap().world_position(), [0.0, 1.0, 0.0]);
}

#[test]
fn scale_applies_before_translation() {
    let mut scene = Scene::new();
    let parent = scene.create_child(scene.root()).unwrap();
    let child = scene.create_child(parent).unwrap();
    {
        let node = scene.get_mut(parent).unwrap();
        node.set_translation(Vector3::new(0.0, 0.0, 3.0));
        node.scale_by(Vector3::new(2.0, 2.0, 2.0));
    }
    scene.get_mut(child).unwrap().set_translation(Vector3::new(1.0, 0.0, 0.0));

    scene.update_world_matrices(&Matrix4::identity()).unwrap();
    assert_vec3_eq(scene.node(child).unwrap().world_position(), [2.0, 0.0, 3.0]);
}

#[test]
fn accumulators_add_and_multiply() {
    let mut scene = Scene::new();
    let id = scene.create_child(scene.root()).unwrap();
    let node = scene.get_mut(id).unwrap();
    node.translate(Vector3::new(1.0, 0.0, 0.0));
    node.translate(Vector3::new(1.0, 1.0, 0.0));
    node.rotate(Vector3::new(0.1, 0.0, 0.0));
    node.rotate(Vector3::new(0.2, 0.0, 0.0));
    node.scale_by(Vector3::new(2.0, 1.0, 1.0));
    node.scale_by(Vector3::new(3.0, 1.0, 1.0));
    assert_vec3_eq(node.translation(), [2.0, 1.0, 0.0]);
    assert_vec3_eq(node.rotation(), [0.3, 0.0, 0.0]);
    assert_vec3_eq(node.scale(), [6.0, 1.0, 1.0]);
}

#[test]
fn reparenting_moves_the_child() {
    let mut scene = Scene::new();
    let p1 = scene.create_child(scene.root()).unwrap();
    let p2 = scene.create_child(scene.root()).unwrap();
    let x = scene.create_child(p1).unwrap();

    scene.add_child(p2, x).unwrap();
    assert!(scene.children(p1).is_empty());
    assert_eq!(scene.children(p2), &[x]);
    assert_eq!(scene.parent(x), Some(p2));
}

#[test]
fn adding_an_existing_child_again_moves_it_to_the_end() {
    let mut scene = Scene::new();
    let parent = scene.create_child(scene.root()).unwrap();
    let a = scene.create_child(parent).unwrap();
    let b = scene.create_child(parent).unwrap();

    scene.add_child(parent, a).unwrap();
    assert_eq!(scene.children(parent), &[b, a]);
}

#[test]
fn cycles_are_rejected() {
    let mut scene = Scene::new();
    let a = scene.create_child(scene.root()).unwrap();
    let b = scene.create_child(a).unwrap();
    let c = scene.create_child(b).unwrap();

    let error = scene.add_child(c, a).unwrap_err();
    assert!(matches!(
        error,
        Error::Tree(TreeError::Cycle { parent, child }) if parent == c && child == a
    ));
    assert!(matches!(
        scene.add_child(a, a),
        Err(Error::Tree(TreeError::Cycle { .. }))
    ));
    // the failed calls left the tree untouched
    assert_eq!(scene.parent(a), Some(scene.root()));
    assert!(scene.children(c).is_empty());
}

#[test]
fn the_root_cannot_be_reparented_or_destroyed() {
    let mut scene = Scene::new();
    let root = scene.root();
    let node = scene.create_child(root).unwrap();
    assert!(matches!(
        scene.add_child(node, root),
        Err(Error::Tree(TreeError::RootNode(_)))
    ));
    assert!(matches!(
        scene.destroy(root, ChildPolicy::Destroy),
        Err(Error::Tree(TreeError::RootNode(_)))
    ));
}

#[test]
fn removing_a_missing_child_is_a_no_op() {
    let mut scene = Scene::new();
    let a = scene.create_child(scene.root()).unwrap();
    let b = scene.create_child(scene.root()).unwrap();
    assert!(!scene.remove_child(a, b).unwrap());
    assert_eq!(scene.parent(b), Some(scene.root()));

    assert!(scene.remove_child(scene.root(), b).unwrap());
    assert_eq!(scene.parent(b), None);
    assert!(scene.contains(b));
}

#[test]
fn unknown_handles_are_reported() {
    let mut scene = Scene::new();
    let gone = scene.create_child(scene.root()).unwrap();
    scene.destroy(gone, ChildPolicy::Destroy).unwrap();
    assert!(matches!(
        scene.create_child(gone),
        Err(Error::Tree(TreeError::UnknownNode(id))) if id == gone
    ));
    assert!(scene.get_mut(gone).is_err());
}

#[test]
fn destroying_with_destroy_removes_the_subtree() {
    let mut scene = Scene::new();
    let a = scene.create_child(scene.root()).unwrap();
    let b = scene.create_child(a).unwrap();
    let c = scene.create_child(b).unwrap();
    let mesh = scene.add_entity(named_mesh("kept"));
    scene.attach_entity(c, mesh).unwrap();

    scene.destroy(a, ChildPolicy::Destroy).unwrap();
    assert!(!scene.contains(a) && !scene.contains(b) && !scene.contains(c));
    assert!(scene.is_empty());
    assert!(scene.entity(mesh).is_some());
    assert_eq!(scene.entity_node(mesh), None);
}

#[test]
fn destroying_with_promote_keeps_the_children_in_place() {
    let mut scene = Scene::new();
    let root = scene.root();
    let first = scene.create_child(root).unwrap();
    let middle = scene.create_child(root).unwrap();
    let last = scene.create_child(root).unwrap();
    let x = scene.create_child(middle).unwrap();
    let y = scene.create_child(middle).unwrap();

    scene.destroy(middle, ChildPolicy::Promote).unwrap();
    assert_eq!(scene.children(root), &[first, x, y, last]);
    assert_eq!(scene.parent(x), Some(root));
    assert_eq!(scene.len(), 5);
}

#[test]
fn world_matrices_clear_the_dirty_flag() {
    let mut scene = Scene::new();
    let id = scene.create_child(scene.root()).unwrap();
    assert!(scene.node(id).unwrap().is_dirty());

    scene.update_world_matrices(&Matrix4::identity()).unwrap();
    assert!(!scene.node(id).unwrap().is_dirty());

    scene.get_mut(id).unwrap().set_scale(Vector3::new(2.0, 2.0, 2.0));
    assert!(scene.node(id).unwrap().is_dirty());
}

#[test]
fn render_visits_in_pre_order() {
    let mut scene = Scene::new();
    let root = scene.root();
    let a = scene.create_child(root).unwrap();
    let a1 = scene.create_child(a).unwrap();
    let a2 = scene.create_child(a).unwrap();
    let b = scene.create_child(root).unwrap();
    for (node, name) in [(a, "a"), (a1, "a1"), (a2, "a2"), (b, "b")] {
        let entity = scene.add_entity(named_mesh(name));
        scene.attach_entity(node, entity).unwrap();
    }

    assert_eq!(scene.traverse(root), vec![root, a, a1, a2, b]);
    let mut backend = RecordingBackend::new();
    let stats = scene.render(&Matrix4::identity(), &mut backend).unwrap();
    assert_eq!(mesh_names(&backend), vec!["a", "a1", "a2", "b"]);
    assert_eq!(stats.nodes, 5);
    assert_eq!(stats.draws, 4);
}

#[test]
fn detached_subtrees_are_not_rendered() {
    let mut scene = Scene::new();
    let orphan = scene.create_node();
    let entity = scene.add_entity(named_mesh("orphan"));
    scene.attach_entity(orphan, entity).unwrap();

    let mut backend = RecordingBackend::new();
    scene.render(&Matrix4::identity(), &mut backend).unwrap();
    assert!(backend.submissions.is_empty());
}

#[test]
fn mesh_draws_carry_world_matrix_and_attributes() {
    let mut scene = Scene::new();
    let node = scene.create_child(scene.root()).unwrap();
    scene.get_mut(node).unwrap().set_translation(Vector3::new(0.0, 0.0, -2.0));
    let bare = GeometryBuffer {
        positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        indices: vec![0, 1, 2],
        ..Default::default()
    };
    let entity = scene.add_entity(Mesh::new(bare.into()));
    scene.attach_entity(node, entity).unwrap();

    let mut backend = RecordingBackend::new();
    scene.render(&Matrix4::identity(), &mut backend).unwrap();
    match &backend.submissions[..] {
        [Submission::Mesh { world, attributes, index_count, texture_slots, .. }] => {
            assert_vec3_eq(world.w.truncate(), [0.0, 0.0, -2.0]);
            assert_eq!(attributes, &vec![VertexAttribute::Position]);
            assert_eq!(*index_count, 3);
            assert!(texture_slots.is_empty());
        }
        other => panic!("unexpected submissions {:?}", other),
    }
}

#[test]
fn meshes_without_indices_submit_nothing() {
    let mut scene = Scene::new();
    let node = scene.create_child(scene.root()).unwrap();
    let entity = scene.add_entity(Mesh::new(GeometryBuffer::default().into()));
    scene.attach_entity(node, entity).unwrap();

    let mut backend = RecordingBackend::new();
    scene.render(&Matrix4::identity(), &mut backend).unwrap();
    assert!(backend.submissions.is_empty());
}

#[test]
fn lights_submit_their_world_position() {
    let mut scene = Scene::new();
    let parent = scene.create_child(scene.root()).unwrap();
    let lamp = scene.create_child(parent).unwrap();
    scene.get_mut(parent).unwrap().set_translation(Vector3::new(0.0, 5.0, 0.0));
    scene.get_mut(lamp).unwrap().set_translation(Vector3::new(1.0, 0.0, 0.0));
    let light = scene.add_entity(Light::new([1.0, 0.5, 0.25, 1.0]));
    scene.attach_entity(lamp, light).unwrap();

    scene
        .entity_mut(light)
        .and_then(|entity| entity.as_light_mut())
        .unwrap()
        .set_intensity([0.5, 0.5, 0.5, 1.0]);

    let mut backend = RecordingBackend::new();
    scene.render(&Matrix4::identity(), &mut backend).unwrap();
    match &backend.submissions[..] {
        [Submission::Light(draw)] => {
            assert_eq!(draw.intensity, [0.5, 0.5, 0.5, 1.0]);
            assert_vec3_eq(
                Vector3::new(draw.position.x, draw.position.y, draw.position.z),
                [1.0, 5.0, 0.0],
            );
        }
        other => panic!("unexpected submissions {:?}", other),
    }
}

#[test]
fn entities_move_between_nodes() {
    let mut scene = Scene::new();
    let a = scene.create_child(scene.root()).unwrap();
    let b = scene.create_child(scene.root()).unwrap();
    let entity = scene.add_entity(named_mesh("moving"));

    scene.attach_entity(a, entity).unwrap();
    scene.attach_entity(b, entity).unwrap();
    assert_eq!(scene.node(a).unwrap().entity(), None);
    assert_eq!(scene.node(b).unwrap().entity(), Some(entity));
    assert_eq!(scene.entity_node(entity), Some(b));

    assert_eq!(scene.detach_entity(b).unwrap(), Some(entity));
    assert_eq!(scene.entity_node(entity), None);
    assert!(scene.remove_entity(entity).is_some());
    assert!(matches!(
        scene.attach_entity(a, entity),
        Err(Error::Tree(TreeError::UnknownEntity(_)))
    ));
}

#[test]
fn non_finite_world_matrices_abort_the_traversal() {
    let mut scene = Scene::new();
    let bad = scene.create_child(scene.root()).unwrap();
    scene
        .get_mut(bad)
        .unwrap()
        .set_scale(Vector3::new(f32::NAN, 1.0, 1.0));

    let error = scene.update_world_matrices(&Matrix4::identity()).unwrap_err();
    assert!(matches!(
        error,
        Error::Degenerate(DegenerateTransform::NonFinite(id)) if id == bad
    ));
}

#[test]
fn a_failing_draw_does_not_stop_the_frame() {
    let mut scene = Scene::new();
    let root = scene.root();
    let eye = scene.create_child(root).unwrap();
    let camera = scene.add_entity(Camera::new(
        [1.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 0.0],
        Projection::default(),
    ));
    scene.attach_entity(eye, camera).unwrap();
    let after = scene.create_child(root).unwrap();
    scene
        .get_mut(after)
        .unwrap()
        .set_translation(Vector3::new(3.0, 0.0, 0.0));
    let mesh = scene.add_entity(named_mesh("after"));
    scene.attach_entity(after, mesh).unwrap();

    let mut backend = RecordingBackend::new();
    let stats = scene.render(&Matrix4::identity(), &mut backend).unwrap();
    assert_eq!(stats.nodes, 3);
    assert_eq!(stats.draws, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(mesh_names(&backend), vec!["after"]);

    let after = scene.node(after).unwrap();
    assert!(!after.is_dirty());
    assert_vec3_eq(after.world_position(), [3.0, 0.0, 0.0]);
}

#[test]
fn world_matrices_are_all_updated_before_a_non_finite_node_is_reported() {
    let mut scene = Scene::new();
    let root = scene.root();
    let bad = scene.create_child(root).unwrap();
    scene
        .get_mut(bad)
        .unwrap()
        .set_scale(Vector3::new(f32::INFINITY, 1.0, 1.0));
    let sibling = scene.create_child(root).unwrap();
    scene
        .get_mut(sibling)
        .unwrap()
        .set_translation(Vector3::new(0.0, 2.0, 0.0));
    let mesh = scene.add_entity(named_mesh("sibling"));
    scene.attach_entity(sibling, mesh).unwrap();

    let mut backend = RecordingBackend::new();
    assert!(scene.render(&Matrix4::identity(), &mut backend).is_err());
    assert!(backend.submissions.is_empty());
    let sibling = scene.node(sibling).unwrap();
    assert!(!sibling.is_dirty());
    assert_vec3_eq(sibling.world_position(), [0.0, 2.0, 0.0]);
}

#[test]
fn deep_hierarchies_do_not_exhaust_the_stack() {
    let mut scene = Scene::new();
    let mut parent = scene.root();
    for _ in 0..5_000 {
        let child = scene.create_child(parent).unwrap();
        scene.get_mut(child).unwrap().translate(Vector3::new(0.0, 0.001, 0.0));
        parent = child;
    }
    let stats = scene.update_world_matrices(&Matrix4::identity()).unwrap();
    assert_eq!(stats.nodes, 5_001);
    assert!((scene.node(parent).unwrap().world_position().y - 5.0).abs() < 0.01);
}
