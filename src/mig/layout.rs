//! Message layout calculation for Mach IPC messages
//!
//! A layout is the ordered list of fields after the header. Variable
//! arrays are packed: the fields that follow an array move with its
//! actual length, so the encoded size is the fixed part plus
//! `element_size * count` for each array.

use crate::ipc::codec::{NdrRecord, PortDescriptor, MACH_MSG_TRAILER_SIZE};
use crate::ipc::MachMsgHeader;

/// Message layout information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLayout {
    /// Total header size (mach_msg_header_t)
    pub header_size: usize,
    /// Body size (fixed part)
    pub body_fixed_size: usize,
    /// Body size (variable part, at maximum)
    pub body_variable_max: usize,
    /// Total minimum size
    pub min_size: usize,
    /// Total maximum size
    pub max_size: usize,
    /// Descriptors in a complex body
    pub descriptor_count: u32,
    /// Fields in message body
    pub fields: Vec<MessageField>,
}

/// A field in the message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageField {
    /// Field name
    pub name: &'static str,
    /// Field size
    pub size: FieldSize,
}

/// Field size information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSize {
    /// Fixed size
    Fixed(usize),
    /// Variable array
    Variable { element: usize, max_elements: usize },
}

impl FieldSize {
    /// Get the byte count (max for variable)
    pub fn bytes(&self) -> usize {
        match self {
            FieldSize::Fixed(s) => *s,
            FieldSize::Variable {
                element,
                max_elements,
            } => element * max_elements,
        }
    }
}

impl MessageLayout {
    /// Does the message carry a descriptor body?
    pub fn is_complex(&self) -> bool {
        self.descriptor_count > 0
    }

    /// Encoded size for the given array lengths, in field order
    ///
    /// Returns `None` if a length exceeds its array's maximum or the number
    /// of lengths doesn't match the number of arrays.
    pub fn size_with(&self, counts: &[usize]) -> Option<usize> {
        let mut counts = counts.iter();
        let mut size = self.min_size;
        for field in &self.fields {
            if let FieldSize::Variable {
                element,
                max_elements,
            } = field.size
            {
                let count = *counts.next()?;
                if count > max_elements {
                    return None;
                }
                size += element * count;
            }
        }
        match counts.next() {
            Some(_) => None,
            None => Some(size),
        }
    }

    /// Receive buffer size: largest message plus the minimal trailer
    pub fn receive_size(&self) -> usize {
        self.max_size + MACH_MSG_TRAILER_SIZE
    }

    /// Byte offset of a named field when every preceding array is empty
    pub fn packed_offset(&self, name: &str) -> Option<usize> {
        let mut offset = self.header_size;
        for field in &self.fields {
            if field.name == name {
                return Some(offset);
            }
            if let FieldSize::Fixed(size) = field.size {
                offset += size;
            }
        }
        None
    }
}

/// Message layout calculator
#[derive(Debug, Default)]
pub struct LayoutBuilder {
    descriptor_count: u32,
    fields: Vec<MessageField>,
}

impl LayoutBuilder {
    /// Create a new layout calculator
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &'static str, size: FieldSize) -> Self {
        self.fields.push(MessageField { name, size });
        self
    }

    /// Port descriptor; makes the message complex and adds the body count
    /// the first time
    pub fn port_descriptor(mut self, name: &'static str) -> Self {
        if self.descriptor_count == 0 {
            self = self.push("msgh_body", FieldSize::Fixed(4));
        }
        self.descriptor_count += 1;
        self.push(name, FieldSize::Fixed(PortDescriptor::SIZE))
    }

    /// NDR record
    pub fn ndr(self) -> Self {
        self.push("NDR", FieldSize::Fixed(NdrRecord::SIZE))
    }

    /// Fixed-size scalar
    pub fn scalar(self, name: &'static str, size: usize) -> Self {
        self.push(name, FieldSize::Fixed(size))
    }

    /// Variable array preceded by its 32-bit element count
    pub fn array(
        self,
        count_name: &'static str,
        name: &'static str,
        element: usize,
        max_elements: usize,
    ) -> Self {
        self.push(count_name, FieldSize::Fixed(4)).push(
            name,
            FieldSize::Variable {
                element,
                max_elements,
            },
        )
    }

    /// Finish the layout
    pub fn build(self) -> MessageLayout {
        let header_size = MachMsgHeader::SIZE;
        let mut body_fixed_size = 0;
        let mut body_variable_max = 0;

        for field in &self.fields {
            match field.size {
                FieldSize::Fixed(size) => body_fixed_size += size,
                FieldSize::Variable { .. } => body_variable_max += field.size.bytes(),
            }
        }

        let min_size = header_size + body_fixed_size;
        MessageLayout {
            header_size,
            body_fixed_size,
            body_variable_max,
            min_size,
            max_size: min_size + body_variable_max,
            descriptor_count: self.descriptor_count,
            fields: self.fields,
        }
    }
}
