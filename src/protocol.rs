use crate::error::{Result, UndoError};

// Coordinator reply to a branch registration.
//
//   result_code: u8
//   [if Failed] msg_len: u16 BE, msg: UTF-8 bytes (at most MAX_MSG_LEN)
//   transaction_exception_code: u8
//   branch_id: u64 BE

pub const BRANCH_REGISTER_RESULT: i16 = 12;

const MAX_MSG_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Failed = 0,
    Success = 1,
}

impl ResultCode {
    pub fn from_u8(code: u8) -> Result<Self> {
        match code {
            0 => Ok(ResultCode::Failed),
            1 => Ok(ResultCode::Success),
            other => Err(UndoError::Decode(format!("invalid result code: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionExceptionCode {
    #[default]
    Unknown,
    BeginFailed,
    LockKeyConflict,
    Io,
    BranchRollbackFailedRetriable,
    BranchRollbackFailedUnretriable,
    BranchRegisterFailed,
    BranchReportFailed,
    LockableCheckFailed,
    BranchTransactionNotExist,
    GlobalTransactionNotExist,
    GlobalTransactionNotActive,
    GlobalTransactionStatusInvalid,
    FailedToSendBranchCommitRequest,
    FailedToSendBranchRollbackRequest,
    FailedToAddBranch,
    FailedLockGlobalTransaction,
    FailedWriteSession,
    FailedStore,
    // Codes newer than this table; kept so they survive a round trip
    Other(u8),
}

impl TransactionExceptionCode {
    const KNOWN: [TransactionExceptionCode; 19] = [
        TransactionExceptionCode::Unknown,
        TransactionExceptionCode::BeginFailed,
        TransactionExceptionCode::LockKeyConflict,
        TransactionExceptionCode::Io,
        TransactionExceptionCode::BranchRollbackFailedRetriable,
        TransactionExceptionCode::BranchRollbackFailedUnretriable,
        TransactionExceptionCode::BranchRegisterFailed,
        TransactionExceptionCode::BranchReportFailed,
        TransactionExceptionCode::LockableCheckFailed,
        TransactionExceptionCode::BranchTransactionNotExist,
        TransactionExceptionCode::GlobalTransactionNotExist,
        TransactionExceptionCode::GlobalTransactionNotActive,
        TransactionExceptionCode::GlobalTransactionStatusInvalid,
        TransactionExceptionCode::FailedToSendBranchCommitRequest,
        TransactionExceptionCode::FailedToSendBranchRollbackRequest,
        TransactionExceptionCode::FailedToAddBranch,
        TransactionExceptionCode::FailedLockGlobalTransaction,
        TransactionExceptionCode::FailedWriteSession,
        TransactionExceptionCode::FailedStore,
    ];

    pub fn from_u8(code: u8) -> Self {
        Self::KNOWN
            .get(code as usize)
            .copied()
            .unwrap_or(TransactionExceptionCode::Other(code))
    }

    pub fn code(&self) -> u8 {
        match self {
            TransactionExceptionCode::Other(code) => *code,
            known => Self::KNOWN
                .iter()
                .position(|c| c == known)
                .map(|i| i as u8)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRegisterResponse {
    pub result_code: ResultCode,
    pub msg: String,
    pub transaction_exception_code: TransactionExceptionCode,
    pub branch_id: i64,
}

impl BranchRegisterResponse {
    pub fn message_type(&self) -> i16 {
        BRANCH_REGISTER_RESULT
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 2 + MAX_MSG_LEN + 1 + 8);
        buf.push(self.result_code as u8);

        // Only failures carry a message
        if self.result_code == ResultCode::Failed {
            let msg = truncate_at_char_boundary(&self.msg, MAX_MSG_LEN);
            buf.extend_from_slice(&(msg.len() as u16).to_be_bytes());
            buf.extend_from_slice(msg.as_bytes());
        }

        buf.push(self.transaction_exception_code.code());
        buf.extend_from_slice(&(self.branch_id as u64).to_be_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = Reader { buf: data, pos: 0 };

        let result_code = ResultCode::from_u8(reader.read_u8()?)?;
        let mut msg = String::new();
        if result_code == ResultCode::Failed {
            let len = reader.read_u16()? as usize;
            if len > 0 {
                msg = String::from_utf8_lossy(reader.read_bytes(len)?).to_string();
            }
        }

        let transaction_exception_code = TransactionExceptionCode::from_u8(reader.read_u8()?);
        let branch_id = reader.read_u64()? as i64;

        Ok(BranchRegisterResponse {
            result_code,
            msg,
            transaction_exception_code,
            branch_id,
        })
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.buf.len() {
            return Err(UndoError::Decode(format!(
                "buffer too short: need {end} bytes, have {}",
                self.buf.len()
            )));
        }
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.read_bytes(2)?);
        Ok(u16::from_be_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_be_bytes(buf))
    }
}
