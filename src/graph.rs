//! Append-only arena holding every entity decoded from a stream.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};

/// Owns all entities decoded from one stream.
///
/// The graph is append-only: scanning only ever adds entities, so ids handed
/// out by earlier [`next_entity`](crate::Scanner::next_entity) calls stay
/// valid for the life of the graph, including across handle-table resets.
/// Once scanning is finished the graph is plain immutable data (`Send` and
/// `Sync`), safe to inspect and render from multiple threads.
///
/// # Rendering
///
/// [`render`](Self::render) produces a diagnostic text form of an entity and
/// everything reachable from it. The decoded graph may be cyclic, so the
/// renderer threads a traversal-scoped set of in-progress ids through its
/// recursion and substitutes `...` where an entity is reached while it is
/// still being rendered. That state is private to each call; concurrent
/// renders of one graph do not interfere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityGraph {
    entities: Vec<Entity>,
}

impl EntityGraph {
    pub(crate) fn new() -> Self {
        Self { entities: Vec::new() }
    }

    pub(crate) fn alloc(&mut self, entity: Entity) -> EntityId {
        let id = EntityId::from_index(self.entities.len());
        self.entities.push(entity);
        id
    }

    pub(crate) fn set_record_field(&mut self, id: EntityId, name: String, value: EntityId) {
        if let Entity::Record(rec) = &mut self.entities[id.index()] {
            rec.set_field(name, value);
        }
    }

    pub(crate) fn add_annotation(&mut self, id: EntityId, annotation: EntityId) {
        if let Entity::Record(rec) = &mut self.entities[id.index()] {
            rec.add_annotation(annotation);
        }
    }

    pub(crate) fn push_element(&mut self, id: EntityId, element: EntityId) {
        if let Entity::Array(arr) = &mut self.entities[id.index()] {
            arr.push(element);
        }
    }

    /// The entity behind `id`, or `None` for an id from another graph.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index())
    }

    /// Number of entities decoded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities in decode order, paired with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().enumerate().map(|(i, e)| (EntityId::from_index(i), e))
    }

    /// Render `id` and everything reachable from it as diagnostic text.
    ///
    /// Terminates on cyclic graphs; a cycle shows up as `...` in place of
    /// the entity already being rendered further up the traversal.
    #[must_use]
    pub fn render(&self, id: EntityId) -> String {
        let mut out = String::new();
        let mut active = Vec::new();
        self.render_entity(id, &mut active, &mut out);
        out
    }

    fn render_entity(&self, id: EntityId, active: &mut Vec<EntityId>, out: &mut String) {
        let Some(entity) = self.get(id) else {
            out.push_str("<dangling>");
            return;
        };
        match entity {
            Entity::Null => out.push_str("Null"),
            Entity::Prim(p) => {
                out.push_str(&format!("Prim({}){{{p}}}", p.type_name()));
            }
            Entity::Text(s) => {
                out.push_str(&format!("Text{{\"{s}\"}}"));
            }
            Entity::Block(bytes) => {
                out.push_str("Block{");
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(&format!("{b:02x}"));
                }
                out.push('}');
            }
            Entity::Array(arr) => {
                out.push_str(&format!("Array({}){{", arr.class_name()));
                if active.contains(&id) {
                    out.push_str("...");
                } else {
                    active.push(id);
                    for (i, element) in arr.elements().iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.render_entity(*element, active, out);
                    }
                    active.pop();
                }
                out.push('}');
            }
            Entity::Record(rec) => {
                out.push_str(&format!("Record({}){{", rec.class_name()));
                if active.contains(&id) {
                    out.push_str("...}");
                    return;
                }
                active.push(id);
                out.push('\n');
                for (name, value) in rec.fields() {
                    indent(out, active.len());
                    out.push_str(name);
                    out.push_str(" = ");
                    self.render_entity(value, active, out);
                    out.push('\n');
                }
                if !rec.annotations().is_empty() {
                    indent(out, active.len());
                    out.push_str("-- custom write data:\n");
                    for annotation in rec.annotations() {
                        indent(out, active.len());
                        self.render_entity(*annotation, active, out);
                        out.push('\n');
                    }
                }
                active.pop();
                indent(out, active.len());
                out.push('}');
            }
        }
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

impl Index<EntityId> for EntityGraph {
    type Output = Entity;

    fn index(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }
}
