use std::mem::size_of;

use crate::error::DecodeError;
use crate::nlmsg::NfNetlinkAttribute;
use crate::sys::{
    nlmsghdr, NFNETLINK_V0, NFNL_MSG_BATCH_BEGIN, NFNL_MSG_BATCH_END, NFNL_SUBSYS_NFTABLES,
    NLA_F_NESTED, NLMSG_ALIGNTO, NLMSG_DONE, NLMSG_ERROR, NLMSG_MIN_TYPE, NLMSG_NOOP,
    NLM_F_DUMP_INTR,
};

/// The largest nf_tables netlink message is a bit larger than 64 KBytes, as the netlink
/// attribute length (nla_len) is 16 bits.
pub fn nft_nlmsg_maxsize() -> u32 {
    u32::from(std::u16::MAX) + unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as u32
}

#[inline]
pub const fn pad_netlink_object_with_variable_size(size: usize) -> usize {
    // align on a 4 bytes boundary
    (size + (NLMSG_ALIGNTO - 1)) & !(NLMSG_ALIGNTO - 1)
}

#[inline]
pub const fn pad_netlink_object<T>() -> usize {
    let size = size_of::<T>();
    pad_netlink_object_with_variable_size(size)
}

/// Size of a `struct nlattr` header (nla_len + nla_type).
pub const NLATTR_HEADER_SIZE: usize = 4;

/// The nfnetlink header that follows every `nlmsghdr` of the nf_tables subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nfgenmsg {
    pub family: u8,
    pub version: u8,
    /// Resource id, in host byte order (it is big-endian on the wire).
    pub res_id: u16,
}

impl Nfgenmsg {
    pub const SIZE: usize = 4;

    pub fn write(&self, buf: &mut [u8]) {
        buf[0] = self.family;
        buf[1] = self.version;
        buf[2..4].copy_from_slice(&self.res_id.to_be_bytes());
    }

    pub fn read(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < Self::SIZE {
            return Err(DecodeError::BufTooSmall);
        }
        Ok(Nfgenmsg {
            family: buf[0],
            version: buf[1],
            res_id: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }
}

pub fn get_subsystem_from_nlmsghdr_type(x: u16) -> u8 {
    ((x & 0xff00) >> 8) as u8
}

pub fn get_operation_from_nlmsghdr_type(x: u16) -> u8 {
    (x & 0x00ff) as u8
}

/// Number of bytes an attribute takes once written, header and padding included.
pub fn attribute_size<T: NfNetlinkAttribute>(obj: &T) -> usize {
    NLATTR_HEADER_SIZE + pad_netlink_object_with_variable_size(obj.get_size())
}

/// Write the attribute, preceded by its `nlattr` header, at the start of `buf`. `buf` must be
/// zeroed and hold at least `attribute_size(obj)` bytes. Returns the number of bytes consumed.
// rewrite of `mnl_attr_put`
pub fn write_attribute<T: NfNetlinkAttribute>(ty: u16, obj: &T, buf: &mut [u8]) -> usize {
    let size = obj.get_size();
    let nla_type = if obj.is_nested() { ty | NLA_F_NESTED } else { ty };

    // nla_len contains the header size + the unpadded attribute length
    buf[0..2].copy_from_slice(&((NLATTR_HEADER_SIZE + size) as u16).to_ne_bytes());
    buf[2..4].copy_from_slice(&nla_type.to_ne_bytes());
    obj.write_payload(&mut buf[NLATTR_HEADER_SIZE..NLATTR_HEADER_SIZE + size]);

    attribute_size(obj)
}

pub fn get_nlmsghdr(buf: &[u8]) -> Result<nlmsghdr, DecodeError> {
    let size_of_hdr = size_of::<nlmsghdr>();

    if buf.len() < size_of_hdr {
        return Err(DecodeError::BufTooSmall);
    }

    let u32_at =
        |pos: usize| u32::from_ne_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
    let u16_at = |pos: usize| u16::from_ne_bytes([buf[pos], buf[pos + 1]]);
    let nlmsghdr = nlmsghdr {
        nlmsg_len: u32_at(0),
        nlmsg_type: u16_at(4),
        nlmsg_flags: u16_at(6),
        nlmsg_seq: u32_at(8),
        nlmsg_pid: u32_at(12),
    };

    if nlmsghdr.nlmsg_len as usize > buf.len() || (nlmsghdr.nlmsg_len as usize) < size_of_hdr {
        return Err(DecodeError::NlMsgTooSmall);
    }

    if nlmsghdr.nlmsg_flags & NLM_F_DUMP_INTR != 0 {
        return Err(DecodeError::ConcurrentGenerationUpdate);
    }

    Ok(nlmsghdr)
}

#[derive(Debug)]
pub enum NlMsg<'a> {
    Done,
    Noop,
    /// An acknowledgement (errno 0) or an error. The errno is always positive.
    Error(i32),
    NfGenMsg(Nfgenmsg, &'a [u8]),
}

pub fn parse_nlmsg(buf: &[u8]) -> Result<(nlmsghdr, NlMsg<'_>), DecodeError> {
    // in theory the message is composed of the following parts:
    // - nlmsghdr (contains the message size and type)
    // - struct nlmsgerr OR nfgenmsg (nftables header that describes the message family)
    // - the raw value that we want to validate (if the previous part is nfgenmsg)
    let hdr = get_nlmsghdr(buf)?;

    let size_of_hdr = pad_netlink_object::<nlmsghdr>();

    if hdr.nlmsg_type < NLMSG_MIN_TYPE {
        match hdr.nlmsg_type {
            NLMSG_NOOP => return Ok((hdr, NlMsg::Noop)),
            NLMSG_ERROR => {
                if (hdr.nlmsg_len as usize) < size_of_hdr + size_of::<i32>() {
                    return Err(DecodeError::NlMsgTooSmall);
                }
                let raw = &buf[size_of_hdr..size_of_hdr + size_of::<i32>()];
                let error = i32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]);
                // some APIs return negative values, while other return positive values
                return Ok((hdr, NlMsg::Error(error.abs())));
            }
            NLMSG_DONE => return Ok((hdr, NlMsg::Done)),
            x => return Err(DecodeError::UnsupportedType(x)),
        }
    }

    // batch messages are not specific to the nftables subsystem
    if hdr.nlmsg_type != NFNL_MSG_BATCH_BEGIN && hdr.nlmsg_type != NFNL_MSG_BATCH_END {
        // verify that we are decoding nftables messages
        let subsys = get_subsystem_from_nlmsghdr_type(hdr.nlmsg_type);
        if subsys != NFNL_SUBSYS_NFTABLES as u8 {
            return Err(DecodeError::InvalidSubsystem(subsys));
        }
    }

    if (hdr.nlmsg_len as usize) < size_of_hdr + Nfgenmsg::SIZE {
        return Err(DecodeError::NlMsgTooSmall);
    }

    let nfgenmsg = Nfgenmsg::read(&buf[size_of_hdr..size_of_hdr + Nfgenmsg::SIZE])?;

    if nfgenmsg.version != NFNETLINK_V0 {
        return Err(DecodeError::InvalidVersion(nfgenmsg.version));
    }

    let raw_value = &buf[size_of_hdr + Nfgenmsg::SIZE..hdr.nlmsg_len as usize];

    Ok((hdr, NlMsg::NfGenMsg(nfgenmsg, raw_value)))
}

impl NfNetlinkAttribute for u8 {
    fn write_payload(&self, buf: &mut [u8]) {
        buf[0] = *self;
    }
}

impl NfNetlinkAttribute for u16 {
    fn write_payload(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_be_bytes());
    }
}

impl NfNetlinkAttribute for i32 {
    fn write_payload(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_be_bytes());
    }
}

impl NfNetlinkAttribute for u32 {
    fn write_payload(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_be_bytes());
    }
}

impl NfNetlinkAttribute for u64 {
    fn write_payload(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_be_bytes());
    }
}

// strings are written NUL-terminated, like `mnl_attr_put_strz`
impl NfNetlinkAttribute for String {
    fn get_size(&self) -> usize {
        self.len() + 1
    }

    fn write_payload(&self, buf: &mut [u8]) {
        buf[..self.len()].copy_from_slice(self.as_bytes());
        buf[self.len()] = 0;
    }
}

impl NfNetlinkAttribute for Vec<u8> {
    fn get_size(&self) -> usize {
        self.len()
    }

    fn write_payload(&self, buf: &mut [u8]) {
        buf.copy_from_slice(self);
    }
}
