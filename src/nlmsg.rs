use std::fmt::Debug;
use std::mem::size_of;

use crate::parser::{pad_netlink_object, pad_netlink_object_with_variable_size, Nfgenmsg};
use crate::sys::{
    nlmsghdr, NFNETLINK_V0, NFNL_MSG_BATCH_BEGIN, NFNL_MSG_BATCH_END, NFNL_SUBSYS_NFTABLES,
    NLM_F_ACK, NLM_F_CREATE, NLM_F_REQUEST,
};
use crate::{MsgType, ProtocolFamily};

/// Appends netlink messages to a byte buffer. Every byte added while a message is open is
/// accounted for in that message's `nlmsg_len`.
pub struct NfNetlinkWriter<'a> {
    buf: &'a mut Vec<u8>,
    // offsets of the headers of the messages being written
    headers: Vec<usize>,
}

impl<'a> NfNetlinkWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> NfNetlinkWriter<'a> {
        NfNetlinkWriter {
            buf,
            headers: Vec::new(),
        }
    }

    pub fn add_data_zeroed(&mut self, size: usize) -> &mut [u8] {
        let padded_size = pad_netlink_object_with_variable_size(size);
        let start = self.buf.len();
        self.buf.resize(start + padded_size, 0);

        // resize all the stacked netlink containers to hold the new bytes
        for &offset in &self.headers {
            let len_field = &mut self.buf[offset..offset + 4];
            let len = u32::from_ne_bytes([len_field[0], len_field[1], len_field[2], len_field[3]]);
            len_field.copy_from_slice(&(len + padded_size as u32).to_ne_bytes());
        }

        &mut self.buf[start..start + size]
    }

    /// Opens a bare netlink message (no subsystem header).
    pub fn write_nlmsghdr(&mut self, msg_type: u16, flags: u16, seq: u32) {
        let start = self.buf.len();
        let nlmsghdr_len = pad_netlink_object::<nlmsghdr>();
        // the new header is not on the stack yet: its length is set explicitly
        let hdr = self.add_data_zeroed(nlmsghdr_len);
        hdr[0..4].copy_from_slice(&(nlmsghdr_len as u32).to_ne_bytes());
        hdr[4..6].copy_from_slice(&msg_type.to_ne_bytes());
        hdr[6..8].copy_from_slice(&(NLM_F_REQUEST | flags).to_ne_bytes());
        hdr[8..12].copy_from_slice(&seq.to_ne_bytes());
        // nlmsg_pid stays 0: the message is addressed to the kernel
        self.headers.push(start);
    }

    // rewrite of `__nftnl_nlmsg_build_hdr`
    pub fn write_header(
        &mut self,
        msg_type: u16,
        family: ProtocolFamily,
        flags: u16,
        seq: u32,
        ressource_id: Option<u16>,
    ) {
        // batch messages are not specific to the nftables subsystem
        let msg_type = if msg_type != NFNL_MSG_BATCH_BEGIN && msg_type != NFNL_MSG_BATCH_END {
            msg_type | (NFNL_SUBSYS_NFTABLES << 8)
        } else {
            msg_type
        };
        self.write_nlmsghdr(msg_type, flags, seq);

        let nfgenmsg = Nfgenmsg {
            family: family as u8,
            version: NFNETLINK_V0,
            res_id: ressource_id.unwrap_or(0),
        };
        nfgenmsg.write(self.add_data_zeroed(pad_netlink_object::<Nfgenmsg>()));
    }

    pub fn finalize_writing_object(&mut self) {
        self.headers.pop();
    }
}

/// A value that can be written as the payload of a netlink attribute.
pub trait NfNetlinkAttribute: Debug + Sized {
    /// Whether the payload is itself a list of attributes (`NLA_F_NESTED`).
    fn is_nested(&self) -> bool {
        false
    }

    fn get_size(&self) -> usize {
        size_of::<Self>()
    }

    /// Writes the payload in `buf`, which is exactly `get_size()` bytes long and zeroed.
    fn write_payload(&self, buf: &mut [u8]);
}

/// A top-level nf_tables object (table, chain, rule) that can be sent in a [`Batch`].
///
/// [`Batch`]: crate::Batch
pub trait NfNetlinkObject: NfNetlinkAttribute {
    const MSG_TYPE_ADD: u16;
    const MSG_TYPE_DEL: u16;

    fn get_family(&self) -> ProtocolFamily;

    fn get_add_flags(&self) -> u16 {
        NLM_F_CREATE
    }

    fn add_or_remove(&self, writer: &mut NfNetlinkWriter<'_>, msg_type: MsgType, seq: u32) {
        let (raw_msg_type, flags) = match msg_type {
            MsgType::Add => (Self::MSG_TYPE_ADD, self.get_add_flags()),
            MsgType::Del => (Self::MSG_TYPE_DEL, 0),
        };
        writer.write_header(raw_msg_type, self.get_family(), flags | NLM_F_ACK, seq, None);
        let buf = writer.add_data_zeroed(self.get_size());
        self.write_payload(buf);
        writer.finalize_writing_object();
    }
}

/// Declares an attribute container: every field is an optional netlink attribute, written in
/// declaration order. The `nested` form sets `NLA_F_NESTED` when the container is itself an
/// attribute, the `object` form adds the protocol family of a top-level nf_tables object.
#[macro_export]
macro_rules! create_wrapper_type {
    (@accessors $struct:ident, [$(($getter_name:ident, $setter_name:ident, $in_place_edit_name:ident, $attr_name:expr, $field:ident, $type:ty)),+]) => {
        impl $struct {
            $(
                #[allow(dead_code)]
                pub fn $getter_name(&self) -> Option<&$type> {
                    self.$field.as_ref()
                }

                #[allow(dead_code)]
                pub fn $setter_name(&mut self, val: impl Into<$type>) {
                    self.$field = Some(val.into());
                }

                #[allow(dead_code)]
                pub fn $in_place_edit_name(mut self, val: impl Into<$type>) -> Self {
                    self.$setter_name(val);
                    self
                }
            )+
        }
    };
    (@attribute $struct:ident, $nested:expr, [$(($attr_name:expr, $field:ident)),+]) => {
        impl $crate::nlmsg::NfNetlinkAttribute for $struct {
            fn is_nested(&self) -> bool {
                $nested
            }

            fn get_size(&self) -> usize {
                let mut size = 0;
                $(
                    if let Some(val) = &self.$field {
                        size += $crate::parser::attribute_size(val);
                    }
                )+
                size
            }

            fn write_payload(&self, buf: &mut [u8]) {
                let mut pos = 0;
                $(
                    if let Some(val) = &self.$field {
                        pos += $crate::parser::write_attribute($attr_name, val, &mut buf[pos..]);
                    }
                )+
                debug_assert_eq!(pos, buf.len());
            }
        }
    };
    ($(#[$meta:meta])* nested : $struct:ident, [$(($getter_name:ident, $setter_name:ident, $in_place_edit_name:ident, $attr_name:expr, $field:ident, $type:ty)),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Default, Debug)]
        pub struct $struct {
            $( $field: Option<$type>, )+
        }

        $crate::create_wrapper_type!(@accessors $struct, [$(($getter_name, $setter_name, $in_place_edit_name, $attr_name, $field, $type)),+]);
        $crate::create_wrapper_type!(@attribute $struct, true, [$(($attr_name, $field)),+]);
    };
    ($(#[$meta:meta])* object : $struct:ident, [$(($getter_name:ident, $setter_name:ident, $in_place_edit_name:ident, $attr_name:expr, $field:ident, $type:ty)),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Default, Debug)]
        pub struct $struct {
            family: $crate::ProtocolFamily,
            $( $field: Option<$type>, )+
        }

        impl $struct {
            pub fn get_family(&self) -> $crate::ProtocolFamily {
                self.family
            }

            pub fn set_family(&mut self, family: $crate::ProtocolFamily) {
                self.family = family;
            }

            pub fn with_family(mut self, family: $crate::ProtocolFamily) -> Self {
                self.family = family;
                self
            }
        }

        $crate::create_wrapper_type!(@accessors $struct, [$(($getter_name, $setter_name, $in_place_edit_name, $attr_name, $field, $type)),+]);
        $crate::create_wrapper_type!(@attribute $struct, false, [$(($attr_name, $field)),+]);
    };
}
