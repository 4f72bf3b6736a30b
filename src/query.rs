//! Blocking helpers around netlink sockets: opening, sending a request and waiting for the
//! kernel acknowledgements.

use std::os::unix::prelude::RawFd;

use nix::errno::Errno;
use nix::sys::socket::{self, AddressFamily, MsgFlags, SockFlag, SockProtocol, SockType};

use crate::error::QueryError;
use crate::parser::{nft_nlmsg_maxsize, pad_netlink_object_with_variable_size, parse_nlmsg, NlMsg};

/// Opens a raw netlink socket of the given protocol (`NetlinkNetFilter` for nf_tables,
/// `NetlinkRoute` for the routing table).
pub fn open_socket(protocol: SockProtocol) -> Result<RawFd, QueryError> {
    socket::socket(
        AddressFamily::Netlink,
        SockType::Raw,
        SockFlag::empty(),
        protocol,
    )
    .map_err(QueryError::NetlinkOpenError)
}

/// Writes the whole buffer on the socket, in one datagram.
pub fn send_all(sock: RawFd, buf: &[u8]) -> Result<(), QueryError> {
    let sent = socket::send(sock, buf, MsgFlags::empty()).map_err(QueryError::NetlinkSendError)?;
    if sent != buf.len() {
        return Err(QueryError::TruncatedSend);
    }
    Ok(())
}

/// Reads the kernel answers until the message with sequence number `max_seq` is acknowledged.
///
/// The kernel keeps processing a batch after rejecting one of its objects, so every reply up to
/// `max_seq` is consumed before failing with the first error. An error on the batch header
/// (sequence number 0) is final, nothing else follows it.
pub(crate) fn recv_and_process_until_seq(sock: RawFd, max_seq: u32) -> Result<(), QueryError> {
    let mut msg_buffer = vec![0; nft_nlmsg_maxsize() as usize];
    let mut first_error = None;

    loop {
        let nb_recv = socket::recv(sock, &mut msg_buffer, MsgFlags::empty())
            .map_err(QueryError::NetlinkRecvError)?;
        if nb_recv == 0 {
            return Err(QueryError::UnexpectedEof);
        }
        let mut buf = &msg_buffer[0..nb_recv];
        loop {
            let (nlmsghdr, msg) = parse_nlmsg(buf)?;
            let seq = nlmsghdr.nlmsg_seq;
            match msg {
                NlMsg::Done => {
                    return first_error.map_or(Ok(()), Err);
                }
                NlMsg::Error(0) => {
                    trace!("Message {} acknowledged", seq);
                }
                NlMsg::Error(e) => {
                    let errno = Errno::from_i32(e);
                    if seq == 0 {
                        return Err(QueryError::NetlinkError { seq, errno });
                    }
                    debug!("Message {} rejected: {}", seq, errno);
                    if first_error.is_none() {
                        first_error = Some(QueryError::NetlinkError { seq, errno });
                    }
                }
                NlMsg::Noop => {}
                NlMsg::NfGenMsg(genmsg, _) => {
                    debug!(
                        "Ignoring message of family {} for seq {}",
                        genmsg.family, seq
                    );
                }
            }

            if seq >= max_seq {
                return first_error.map_or(Ok(()), Err);
            }

            // netlink messages are 4bytes aligned
            let aligned_length = pad_netlink_object_with_variable_size(nlmsghdr.nlmsg_len as usize);
            if aligned_length >= buf.len() {
                // exit the loop and try to receive further messages when we consumed all the buffer
                break;
            }

            // retrieve the next message
            buf = &buf[aligned_length..];
        }
    }
}
