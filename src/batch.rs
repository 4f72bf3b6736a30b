use std::os::unix::prelude::RawFd;

use crate::error::QueryError;
use crate::nlmsg::{NfNetlinkObject, NfNetlinkWriter};
use crate::query::{recv_and_process_until_seq, send_all};
use crate::sys::{NFNL_MSG_BATCH_BEGIN, NFNL_MSG_BATCH_END, NFNL_SUBSYS_NFTABLES};
use crate::{MsgType, ProtocolFamily};

/// A batch of netfilter messages to be performed in one atomic operation. Corresponds to
/// `nftnl_batch` in libnftnl.
///
/// The batch begin message carries the sequence number 0, the objects are numbered from 1 in the
/// order they were added.
#[derive(Debug)]
pub struct Batch {
    buf: Vec<u8>,
    seq: u32,
}

impl Batch {
    /// Creates a new nftnl batch with the [default page size].
    ///
    /// [default page size]: fn.default_batch_page_size.html
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(default_batch_page_size() as usize);
        NfNetlinkWriter::new(&mut buf).write_header(
            NFNL_MSG_BATCH_BEGIN,
            ProtocolFamily::Unspec,
            0,
            0,
            Some(NFNL_SUBSYS_NFTABLES),
        );
        Batch { buf, seq: 1 }
    }

    /// Adds the given message to this batch.
    pub fn add<T: NfNetlinkObject>(&mut self, msg: &T, msg_type: MsgType) {
        trace!("Writing NlMsg with seq {} to batch", self.seq);
        let mut writer = NfNetlinkWriter::new(&mut self.buf);
        msg.add_or_remove(&mut writer, msg_type, self.seq);
        self.seq += 1;
    }

    /// Number of objects added to the batch so far.
    pub fn len(&self) -> usize {
        (self.seq - 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds the final end message to the batch and returns a [`FinalizedBatch`] that can be used
    /// to send the messages to netfilter.
    pub fn finalize(mut self) -> FinalizedBatch {
        NfNetlinkWriter::new(&mut self.buf).write_header(
            NFNL_MSG_BATCH_END,
            ProtocolFamily::Unspec,
            0,
            self.seq,
            Some(NFNL_SUBSYS_NFTABLES),
        );
        FinalizedBatch {
            buf: self.buf,
            max_seq: self.seq - 1,
        }
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

/// A wrapper over [`Batch`], guaranteed to start with a proper batch begin and end with a proper
/// batch end message. Created from [`Batch::finalize`].
#[derive(Debug)]
pub struct FinalizedBatch {
    buf: Vec<u8>,
    max_seq: u32,
}

impl FinalizedBatch {
    /// The bytes to write on the netlink socket.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Sequence number of the last object of the batch, 0 if the batch is empty.
    pub fn max_seq(&self) -> u32 {
        self.max_seq
    }

    /// Sends the batch on an already opened nfnetlink socket and waits for the kernel to
    /// acknowledge every object.
    pub fn send_on(&self, sock: RawFd) -> Result<(), QueryError> {
        debug!(
            "Sending a batch of {} objects ({} bytes)",
            self.max_seq,
            self.buf.len()
        );
        send_all(sock, &self.buf)?;
        if self.max_seq == 0 {
            // nothing will be acknowledged
            return Ok(());
        }
        recv_and_process_until_seq(sock, self.max_seq)
    }
}

/// Selected batch page is 256 Kbytes long to load ruleset of half a million rules without hitting
/// -EMSGSIZE due to large iovec.
pub fn default_batch_page_size() -> u32 {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as u32 * 32 }
}
