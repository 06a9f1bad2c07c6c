//! The tag-dispatch decoder walking the serial-stream grammar.

use std::io::Read;

use tracing::{debug, trace, warn};

use crate::descriptor::{
    ClassDesc, Component, DescId, DescKind, DescTable, FieldDesc, PrimType, PROXY_CLASS_NAME,
};
use crate::entity::{ArrayValue, Entity, EntityId, RecordValue, ENUM_NAME_KEY};
use crate::error::{ScanError, ScanResult};
use crate::graph::EntityGraph;
use crate::handles::{HandleTable, HandleTarget};
use crate::reader::ByteReader;
use crate::wire::{self, flag, tag};

/// What one record read produced.
///
/// Class descriptors travel through the same record grammar as entities but
/// must never escape to a caller expecting a value; the end-of-block
/// sentinel is only meaningful to annotation loops. Keeping all three in one
/// result lets each context reject exactly what is illegal for it.
enum Item {
    Entity(EntityId),
    Desc(DescId),
    End,
}

/// Decodes a serial stream into entities without loading any classes.
///
/// Construction validates the stream header; each [`next_entity`] call then
/// decodes one top-level record into the scanner's [`EntityGraph`]. A
/// scanner owns its read cursor, handle table, and graph exclusively — one
/// scanner per stream, and a scanner that has returned a fatal error must
/// be discarded, since its handle table may no longer match the stream.
///
/// # Example
///
/// ```
/// use serialscan::Scanner;
///
/// // Header, then a block-data record with three raw bytes.
/// let bytes: &[u8] = &[0xAC, 0xED, 0x00, 0x05, 0x77, 0x03, 1, 2, 3];
/// let mut scanner = Scanner::new(bytes)?;
/// let id = scanner.next_entity()?.expect("one record");
/// assert_eq!(scanner.graph()[id].as_block(), Some(&[1u8, 2, 3][..]));
/// # Ok::<(), serialscan::ScanError>(())
/// ```
///
/// [`next_entity`]: Scanner::next_entity
#[derive(Debug)]
pub struct Scanner<R> {
    reader: ByteReader<R>,
    graph: EntityGraph,
    descs: DescTable,
    handles: HandleTable,
}

impl<R: Read> Scanner<R> {
    /// Start scanning `source`.
    ///
    /// # Errors
    ///
    /// Fails with [`ScanError::BadHeader`] if the source does not begin
    /// with the protocol magic and version, or with an I/O error from the
    /// source itself.
    pub fn new(source: R) -> ScanResult<Self> {
        let mut reader = ByteReader::new(source);
        let magic = reader.read_u16()?;
        let version = reader.read_u16()?;
        if magic != wire::STREAM_MAGIC || version != wire::STREAM_VERSION {
            return Err(ScanError::BadHeader { magic, version });
        }
        trace!("stream header validated");
        Ok(Self {
            reader,
            graph: EntityGraph::new(),
            descs: DescTable::new(),
            handles: HandleTable::new(),
        })
    }

    /// Decode the next top-level record.
    ///
    /// Returns `Ok(None)` when the source is exhausted at a record
    /// boundary. Entities returned by earlier calls stay valid in the
    /// [`graph`](Self::graph) regardless of later errors.
    ///
    /// # Errors
    ///
    /// Any corrupted-stream condition, an in-stream aborted-write marker,
    /// or an I/O failure. None of these are retryable.
    pub fn next_entity(&mut self) -> ScanResult<Option<EntityId>> {
        loop {
            let Some(tag_byte) = self.reader.try_read_u8()? else {
                return Ok(None);
            };
            let Some(item) = self.dispatch(tag_byte)? else {
                continue;
            };
            return match item {
                Item::Entity(id) => Ok(Some(id)),
                Item::End => {
                    Err(ScanError::corrupted("end-of-block sentinel at top level"))
                }
                Item::Desc(_) => {
                    Err(ScanError::corrupted("class descriptor outside descriptor context"))
                }
            };
        }
    }

    /// The entities decoded so far.
    #[must_use]
    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }

    /// Consume the scanner, keeping only the decoded entities.
    #[must_use]
    pub fn into_graph(self) -> EntityGraph {
        self.graph
    }

    /// Read one record, consuming interleaved descriptor and reset records
    /// without returning them.
    fn read_item(&mut self) -> ScanResult<Item> {
        loop {
            let tag_byte = self.reader.read_u8()?;
            if let Some(item) = self.dispatch(tag_byte)? {
                return Ok(item);
            }
        }
    }

    /// Read one record where an entity is required.
    fn read_entity(&mut self) -> ScanResult<EntityId> {
        match self.read_item()? {
            Item::Entity(id) => Ok(id),
            Item::End => Err(ScanError::corrupted("unexpected end-of-block sentinel")),
            Item::Desc(_) => {
                Err(ScanError::corrupted("class descriptor outside descriptor context"))
            }
        }
    }

    /// Read one record that must be a string, e.g. an enum constant's name.
    fn read_text_entity(&mut self) -> ScanResult<EntityId> {
        let id = self.read_entity()?;
        match self.graph.get(id) {
            Some(Entity::Text(_)) => Ok(id),
            _ => Err(ScanError::corrupted("expected a string record")),
        }
    }

    /// Handle one tag. `None` means the record was consumed without
    /// producing anything (descriptor interleave, handle-table reset) and
    /// the caller should read on.
    fn dispatch(&mut self, tag_byte: u8) -> ScanResult<Option<Item>> {
        trace!("record tag {tag_byte:#04x}");
        let item = match tag_byte {
            tag::OBJECT => Item::Entity(self.read_new_object()?),
            tag::ARRAY => Item::Entity(self.read_new_array()?),
            tag::STRING => Item::Entity(self.read_new_string()?),
            tag::LONG_STRING => Item::Entity(self.read_new_long_string()?),
            tag::ENUM => Item::Entity(self.read_new_enum()?),
            tag::NULL => Item::Entity(self.graph.alloc(Entity::Null)),
            tag::REFERENCE => match self.read_back_reference()? {
                HandleTarget::Entity(id) => Item::Entity(id),
                HandleTarget::Desc(id) => Item::Desc(id),
            },
            tag::CLASS => Item::Desc(self.read_class_literal()?),
            tag::CLASS_DESC | tag::PROXY_CLASS_DESC => {
                self.read_class_desc_body(tag_byte)?;
                return Ok(None);
            }
            tag::RESET => {
                debug!("handle table reset");
                self.handles.reset();
                return Ok(None);
            }
            tag::BLOCK_DATA => {
                let len = usize::from(self.reader.read_u8()?);
                Item::Entity(self.read_block(len)?)
            }
            tag::BLOCK_DATA_LONG => {
                let len = self.reader.read_i32()?;
                if len < 0 {
                    return Err(ScanError::corrupted(format!("negative block length {len}")));
                }
                Item::Entity(self.read_block(len as usize)?)
            }
            tag::END_BLOCK_DATA => Item::End,
            tag::EXCEPTION => {
                // The stream aborted partway through writing. The handle
                // table is reset on both sides of the embedded description,
                // and nothing after it is trustworthy.
                warn!("stream reports an aborted write");
                self.handles.reset();
                let description_id = self.read_entity()?;
                let description = self.graph.render(description_id);
                self.handles.reset();
                return Err(ScanError::Aborted { description });
            }
            other => return Err(ScanError::BadTag(other)),
        };
        Ok(Some(item))
    }

    fn read_new_object(&mut self) -> ScanResult<EntityId> {
        let desc_id = self
            .read_class_desc()?
            .ok_or_else(|| ScanError::corrupted("object record without class descriptor"))?;
        let class_name = self.descs.get(desc_id).name.clone();
        let record = self.graph.alloc(Entity::Record(RecordValue::new(class_name)));
        self.handles.register(HandleTarget::Entity(record));
        for level in self.descs.hierarchy(desc_id)? {
            self.read_class_data(record, level)?;
        }
        Ok(record)
    }

    /// Read one ancestry level's contribution to `record`, as directed by
    /// that level's flags.
    fn read_class_data(&mut self, record: EntityId, desc_id: DescId) -> ScanResult<()> {
        let (flags, fields) = {
            let desc = self.descs.get(desc_id);
            (desc.flags, desc.fields.clone())
        };
        if flags & flag::SERIALIZABLE != 0 {
            for field in fields {
                let (name, value) = match field {
                    FieldDesc::Primitive { name, ty } => {
                        let value = ty.read(&mut self.reader)?;
                        (name, self.graph.alloc(Entity::Prim(value)))
                    }
                    FieldDesc::Reference { name, .. } => (name, self.read_entity()?),
                };
                self.graph.set_record_field(record, name, value);
            }
            if flags & flag::WRITE_METHOD != 0 {
                self.read_annotations(record)?;
            }
        } else if flags & flag::EXTERNALIZABLE != 0 {
            if flags & flag::BLOCK_DATA == 0 {
                // Externally-written content without block-data framing is
                // class-defined bytes with no generic interpretation.
                return Err(ScanError::corrupted(
                    "externalizable contents without block-data framing",
                ));
            }
            self.read_annotations(record)?;
        }
        Ok(())
    }

    /// Read an annotation block onto `record`, up to the end sentinel.
    fn read_annotations(&mut self, record: EntityId) -> ScanResult<()> {
        loop {
            match self.read_item()? {
                Item::End => return Ok(()),
                Item::Entity(id) => self.graph.add_annotation(record, id),
                Item::Desc(_) => {
                    return Err(ScanError::corrupted(
                        "class descriptor outside descriptor context",
                    ));
                }
            }
        }
    }

    fn read_new_array(&mut self) -> ScanResult<EntityId> {
        let desc_id = self
            .read_class_desc()?
            .ok_or_else(|| ScanError::corrupted("array record without class descriptor"))?;
        let (class_name, component) = {
            let desc = self.descs.get(desc_id);
            match &desc.kind {
                DescKind::Array { component } => (desc.name.clone(), *component),
                _ => {
                    return Err(ScanError::corrupted(format!(
                        "array record with non-array class {}",
                        desc.name
                    )));
                }
            }
        };
        let len = self.reader.read_i32()?;
        if len < 0 {
            return Err(ScanError::corrupted(format!("negative array length {len}")));
        }
        let array = self.graph.alloc(Entity::Array(ArrayValue::new(class_name, len as usize)));
        self.handles.register(HandleTarget::Entity(array));
        for _ in 0..len {
            let element = match component {
                Component::Primitive(ty) => {
                    let value = ty.read(&mut self.reader)?;
                    self.graph.alloc(Entity::Prim(value))
                }
                Component::Reference(_) => self.read_entity()?,
            };
            self.graph.push_element(array, element);
        }
        Ok(array)
    }

    fn read_new_string(&mut self) -> ScanResult<EntityId> {
        let text = self.reader.read_short_text()?;
        let id = self.graph.alloc(Entity::Text(text));
        self.handles.register(HandleTarget::Entity(id));
        Ok(id)
    }

    fn read_new_long_string(&mut self) -> ScanResult<EntityId> {
        let len = self.reader.read_i64()?;
        if len < 0 {
            return Err(ScanError::corrupted(format!("negative string length {len}")));
        }
        let text = self.reader.read_long_text(len as u64)?;
        let id = self.graph.alloc(Entity::Text(text));
        self.handles.register(HandleTarget::Entity(id));
        Ok(id)
    }

    fn read_new_enum(&mut self) -> ScanResult<EntityId> {
        let desc_id = self
            .read_class_desc()?
            .ok_or_else(|| ScanError::corrupted("enum record without class descriptor"))?;
        let class_name = self.descs.get(desc_id).name.clone();
        let record = self.graph.alloc(Entity::Record(RecordValue::new(class_name)));
        self.handles.register(HandleTarget::Entity(record));
        let name = self.read_text_entity()?;
        self.graph.set_record_field(record, ENUM_NAME_KEY.to_owned(), name);
        Ok(record)
    }

    fn read_back_reference(&mut self) -> ScanResult<HandleTarget> {
        let handle = self.reader.read_i32()?;
        self.handles.resolve(handle)
    }

    fn read_block(&mut self, len: usize) -> ScanResult<EntityId> {
        let data = self.reader.read_vec(len)?;
        Ok(self.graph.alloc(Entity::Block(data)))
    }

    /// A class-descriptor-as-value record. The descriptor gets an extra
    /// handle registration for the class value itself.
    fn read_class_literal(&mut self) -> ScanResult<DescId> {
        let desc_id = self
            .read_class_desc()?
            .ok_or_else(|| ScanError::corrupted("class literal without class descriptor"))?;
        self.handles.register(HandleTarget::Desc(desc_id));
        Ok(desc_id)
    }

    /// Resolve the class descriptor position in the grammar: a fresh
    /// descriptor, a back-reference to one, or null for none.
    fn read_class_desc(&mut self) -> ScanResult<Option<DescId>> {
        let tag_byte = self.reader.read_u8()?;
        match tag_byte {
            tag::CLASS_DESC | tag::PROXY_CLASS_DESC => {
                Ok(Some(self.read_class_desc_body(tag_byte)?))
            }
            tag::NULL => Ok(None),
            tag::REFERENCE => match self.read_back_reference()? {
                HandleTarget::Desc(id) => Ok(Some(id)),
                HandleTarget::Entity(_) => Err(ScanError::corrupted(
                    "back-reference does not name a class descriptor",
                )),
            },
            other => Err(ScanError::corrupted(format!("bad class descriptor tag {other:#04x}"))),
        }
    }

    fn read_class_desc_body(&mut self, tag_byte: u8) -> ScanResult<DescId> {
        if tag_byte == tag::CLASS_DESC {
            self.read_plain_class_desc()
        } else {
            self.read_proxy_class_desc()
        }
    }

    fn read_plain_class_desc(&mut self) -> ScanResult<DescId> {
        let name = self.reader.read_short_text()?;
        let suid = self.reader.read_i64()?;
        let flags = self.reader.read_u8()?;
        trace!("class descriptor {name}");

        let kind = if name.starts_with('[') {
            let component = self.descs.derive_component(&name, flags)?;
            DescKind::Array { component }
        } else {
            DescKind::Plain
        };
        // Registered as soon as name and flags are known, before fields and
        // superclass: the rest of the descriptor may refer back to it.
        let desc_id = self.descs.alloc(ClassDesc::new(name, flags, suid, kind));
        self.handles.register(HandleTarget::Desc(desc_id));

        let field_count = self.reader.read_u16()?;
        let mut fields = Vec::with_capacity(usize::from(field_count));
        for _ in 0..field_count {
            fields.push(self.read_field_desc()?);
        }
        self.descs.get_mut(desc_id).fields = fields;

        self.skip_class_annotation()?;
        let super_desc = self.read_class_desc()?;
        self.descs.get_mut(desc_id).super_desc = super_desc;
        Ok(desc_id)
    }

    fn read_proxy_class_desc(&mut self) -> ScanResult<DescId> {
        let desc_id = self.descs.alloc(ClassDesc::new(
            PROXY_CLASS_NAME.to_owned(),
            flag::SERIALIZABLE,
            0,
            DescKind::Proxy { interfaces: Vec::new() },
        ));
        self.handles.register(HandleTarget::Desc(desc_id));

        let count = self.reader.read_i32()?;
        if count < 0 {
            return Err(ScanError::corrupted(format!("negative interface count {count}")));
        }
        let mut interfaces = Vec::with_capacity(count as usize);
        for _ in 0..count {
            interfaces.push(self.reader.read_short_text()?);
        }
        if let DescKind::Proxy { interfaces: slot } = &mut self.descs.get_mut(desc_id).kind {
            *slot = interfaces;
        }

        self.skip_class_annotation()?;
        let super_desc = self.read_class_desc()?;
        self.descs.get_mut(desc_id).super_desc = super_desc;
        Ok(desc_id)
    }

    /// Class-level annotation data is reserved for custom class metadata;
    /// it is read for framing and discarded.
    fn skip_class_annotation(&mut self) -> ScanResult<()> {
        loop {
            if let Item::End = self.read_item()? {
                return Ok(());
            }
        }
    }

    fn read_field_desc(&mut self) -> ScanResult<FieldDesc> {
        let code = self.reader.read_u8()?;
        if code == b'L' || code == b'[' {
            let name = self.reader.read_short_text()?;
            let type_id = self.read_text_entity()?;
            let class_name = match self.graph.get(type_id) {
                Some(Entity::Text(s)) => s.clone(),
                _ => return Err(ScanError::corrupted("field type name is not a string")),
            };
            return Ok(FieldDesc::Reference { name, class_name });
        }
        if let Some(ty) = PrimType::from_code(code) {
            let name = self.reader.read_short_text()?;
            return Ok(FieldDesc::Primitive { name, ty });
        }
        Err(ScanError::corrupted(format!("bad field type code {code:#04x}")))
    }
}
