//! Claim script parsing.
//!
//! A claim-bearing output script is one of
//!
//! ```text
//! OP_CLAIM_NAME    <name> <value>            OP_2DROP OP_DROP  <pay script>
//! OP_SUPPORT_CLAIM <name> <claim id>         OP_2DROP OP_DROP  <pay script>
//! OP_SUPPORT_CLAIM <name> <claim id> <value> OP_2DROP OP_2DROP <pay script>
//! OP_UPDATE_CLAIM  <name> <claim id> <value> OP_2DROP OP_2DROP <pay script>
//! ```
//!
//! Pushes use the usual variable-length encodings: a direct length byte below
//! `OP_PUSHDATA1`, or `OP_PUSHDATA1/2/4` followed by a 1, 2 or 4 byte
//! little-endian length. The name must be a direct push.

use crate::errors::ScriptError;
use crate::opcodes::*;

const NAME_DROP: [u8; 2] = [OP_2DROP, OP_DROP];
const VALUE_DROP: [u8; 2] = [OP_2DROP, OP_2DROP];
const CLAIM_ID_LEN: usize = 20;

/// Which claim opcode leads the script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    ClaimName,
    SupportClaim,
    UpdateClaim,
}

impl ScriptKind {
    /// Classify by the leading opcode; `None` for ordinary scripts
    pub fn of(script: &[u8]) -> Option<Self> {
        match script.first().copied() {
            Some(OP_CLAIM_NAME) => Some(ScriptKind::ClaimName),
            Some(OP_SUPPORT_CLAIM) => Some(ScriptKind::SupportClaim),
            Some(OP_UPDATE_CLAIM) => Some(ScriptKind::UpdateClaim),
            _ => None,
        }
    }

    pub fn opcode(self) -> u8 {
        match self {
            ScriptKind::ClaimName => OP_CLAIM_NAME,
            ScriptKind::SupportClaim => OP_SUPPORT_CLAIM,
            ScriptKind::UpdateClaim => OP_UPDATE_CLAIM,
        }
    }
}

pub fn is_claim_name_script(script: &[u8]) -> bool {
    ScriptKind::of(script) == Some(ScriptKind::ClaimName)
}

pub fn is_support_script(script: &[u8]) -> bool {
    ScriptKind::of(script) == Some(ScriptKind::SupportClaim)
}

pub fn is_update_script(script: &[u8]) -> bool {
    ScriptKind::of(script) == Some(ScriptKind::UpdateClaim)
}

pub fn is_claim_script(script: &[u8]) -> bool {
    ScriptKind::of(script).is_some()
}

/// A parsed claim-bearing script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimScript {
    Name {
        name: String,
        value: Vec<u8>,
        pay_script: Vec<u8>,
    },
    Support {
        name: String,
        claim_id: String,
        value: Option<Vec<u8>>,
        pay_script: Vec<u8>,
    },
    Update {
        name: String,
        claim_id: String,
        value: Vec<u8>,
        pay_script: Vec<u8>,
    },
}

impl ClaimScript {
    /// Parse any of the three claim script kinds
    pub fn parse(script: &[u8]) -> Result<Self, ScriptError> {
        match ScriptKind::of(script) {
            Some(ScriptKind::ClaimName) => parse_claim_name_script(script),
            Some(ScriptKind::SupportClaim) => parse_support_script(script),
            Some(ScriptKind::UpdateClaim) => parse_update_script(script),
            None => Err(ScriptError::NotClaimScript(script.first().copied().unwrap_or(OP_0))),
        }
    }

    pub fn kind(&self) -> ScriptKind {
        match self {
            ClaimScript::Name { .. } => ScriptKind::ClaimName,
            ClaimScript::Support { .. } => ScriptKind::SupportClaim,
            ClaimScript::Update { .. } => ScriptKind::UpdateClaim,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ClaimScript::Name { name, .. }
            | ClaimScript::Support { name, .. }
            | ClaimScript::Update { name, .. } => name,
        }
    }

    pub fn value(&self) -> Option<&[u8]> {
        match self {
            ClaimScript::Name { value, .. } | ClaimScript::Update { value, .. } => Some(value),
            ClaimScript::Support { value, .. } => value.as_deref(),
        }
    }

    pub fn pay_script(&self) -> &[u8] {
        match self {
            ClaimScript::Name { pay_script, .. }
            | ClaimScript::Support { pay_script, .. }
            | ClaimScript::Update { pay_script, .. } => pay_script,
        }
    }

    /// Referenced claim id for supports and updates
    pub fn claim_id(&self) -> Option<&str> {
        match self {
            ClaimScript::Name { .. } => None,
            ClaimScript::Support { claim_id, .. } | ClaimScript::Update { claim_id, .. } => Some(claim_id),
        }
    }
}

pub fn parse_claim_name_script(script: &[u8]) -> Result<ClaimScript, ScriptError> {
    let mut reader = PushReader::after_opcode(script, OP_CLAIM_NAME)?;
    let name = reader.read_name()?;
    let value = reader.read_push()?.to_vec();
    reader.expect_marker(NAME_DROP)?;
    Ok(ClaimScript::Name {
        name,
        value,
        pay_script: reader.rest().to_vec(),
    })
}

pub fn parse_support_script(script: &[u8]) -> Result<ClaimScript, ScriptError> {
    let mut reader = PushReader::after_opcode(script, OP_SUPPORT_CLAIM)?;
    let name = reader.read_name()?;
    let claim_id = reader.read_claim_id()?;
    let value = if reader.at_marker(NAME_DROP) {
        reader.expect_marker(NAME_DROP)?;
        None
    } else {
        let value = reader.read_push()?.to_vec();
        reader.expect_marker(VALUE_DROP)?;
        Some(value)
    };
    Ok(ClaimScript::Support {
        name,
        claim_id,
        value,
        pay_script: reader.rest().to_vec(),
    })
}

pub fn parse_update_script(script: &[u8]) -> Result<ClaimScript, ScriptError> {
    let mut reader = PushReader::after_opcode(script, OP_UPDATE_CLAIM)?;
    let name = reader.read_name()?;
    let claim_id = reader.read_claim_id()?;
    let value = reader.read_push()?.to_vec();
    reader.expect_marker(VALUE_DROP)?;
    Ok(ClaimScript::Update {
        name,
        claim_id,
        value,
        pay_script: reader.rest().to_vec(),
    })
}

/// Returns the embedded pay script of a claim script without decoding the fields
pub fn strip_claim_prefix(script: &[u8]) -> Result<Vec<u8>, ScriptError> {
    ClaimScript::parse(script).map(|parsed| parsed.pay_script().to_vec())
}

struct PushReader<'a> {
    script: &'a [u8],
    offset: usize,
}

impl<'a> PushReader<'a> {
    fn after_opcode(script: &'a [u8], opcode: u8) -> Result<Self, ScriptError> {
        match script.first().copied() {
            Some(op) if op == opcode => Ok(Self { script, offset: 1 }),
            other => Err(ScriptError::NotClaimScript(other.unwrap_or(OP_0))),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ScriptError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.script.len())
            .ok_or(ScriptError::Truncated { offset: self.offset, needed: len })?;
        let bytes = &self.script[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn byte(&mut self) -> Result<u8, ScriptError> {
        Ok(self.take(1)?[0])
    }

    fn read_name(&mut self) -> Result<String, ScriptError> {
        let len = self.byte()?;
        if len >= OP_PUSHDATA1 {
            return Err(ScriptError::NameLengthUnsupported(len));
        }
        let bytes = self.take(len as usize)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn read_claim_id(&mut self) -> Result<String, ScriptError> {
        let raw = self.read_push()?;
        if raw.len() != CLAIM_ID_LEN {
            return Err(ScriptError::InvalidClaimId(raw.len()));
        }
        let mut reversed = raw.to_vec();
        reversed.reverse();
        Ok(hex::encode(reversed))
    }

    fn read_push(&mut self) -> Result<&'a [u8], ScriptError> {
        let at = self.offset;
        let opcode = self.byte()?;
        let len = match opcode {
            len if len < OP_PUSHDATA1 => len as usize,
            OP_PUSHDATA1 => self.byte()? as usize,
            OP_PUSHDATA2 => {
                let raw = self.take(2)?;
                u16::from_le_bytes([raw[0], raw[1]]) as usize
            }
            OP_PUSHDATA4 => {
                let raw = self.take(4)?;
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
            }
            opcode => return Err(ScriptError::InvalidPush { offset: at, opcode }),
        };
        self.take(len)
    }

    fn at_marker(&self, marker: [u8; 2]) -> bool {
        self.script.get(self.offset..self.offset + 2) == Some(&marker[..])
    }

    fn expect_marker(&mut self, marker: [u8; 2]) -> Result<(), ScriptError> {
        if !self.at_marker(marker) {
            let end = (self.offset + 2).min(self.script.len());
            return Err(ScriptError::MissingDropMarker {
                offset: self.offset,
                found: self.script[self.offset.min(end)..end].to_vec(),
            });
        }
        self.offset += 2;
        Ok(())
    }

    fn rest(self) -> &'a [u8] {
        &self.script[self.offset..]
    }
}

/// Append `data` using the smallest push encoding that fits
pub fn push_data(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len < OP_PUSHDATA1 as usize {
        out.push(len as u8);
    } else if len <= u8::MAX as usize {
        out.push(OP_PUSHDATA1);
        out.push(len as u8);
    } else if len <= u16::MAX as usize {
        out.push(OP_PUSHDATA2);
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        out.push(OP_PUSHDATA4);
        out.extend_from_slice(&(len as u32).to_le_bytes());
    }
    out.extend_from_slice(data);
}

/// Names are always direct pushes; anything longer than 75 bytes cannot be read back
fn push_name(out: &mut Vec<u8>, name: &str) -> Result<(), ScriptError> {
    if name.len() >= OP_PUSHDATA1 as usize {
        return Err(ScriptError::NameTooLong(name.len()));
    }
    push_data(out, name.as_bytes());
    Ok(())
}

fn push_claim_id(out: &mut Vec<u8>, claim_id: &str) -> Result<(), ScriptError> {
    let mut raw = hex::decode(claim_id).map_err(|_| ScriptError::InvalidClaimId(claim_id.len() / 2))?;
    if raw.len() != CLAIM_ID_LEN {
        return Err(ScriptError::InvalidClaimId(raw.len()));
    }
    raw.reverse();
    push_data(out, &raw);
    Ok(())
}

/// Build `OP_CLAIM_NAME <name> <value> OP_2DROP OP_DROP <pay script>`
pub fn build_claim_name_script(name: &str, value: &[u8], pay_script: &[u8]) -> Result<Vec<u8>, ScriptError> {
    let mut script = vec![OP_CLAIM_NAME];
    push_name(&mut script, name)?;
    push_data(&mut script, value);
    script.extend_from_slice(&NAME_DROP);
    script.extend_from_slice(pay_script);
    Ok(script)
}

/// Build a support script, with or without an attached value
pub fn build_support_script(
    name: &str,
    claim_id: &str,
    value: Option<&[u8]>,
    pay_script: &[u8],
) -> Result<Vec<u8>, ScriptError> {
    let mut script = vec![OP_SUPPORT_CLAIM];
    push_name(&mut script, name)?;
    push_claim_id(&mut script, claim_id)?;
    match value {
        Some(value) => {
            push_data(&mut script, value);
            script.extend_from_slice(&VALUE_DROP);
        }
        None => script.extend_from_slice(&NAME_DROP),
    }
    script.extend_from_slice(pay_script);
    Ok(script)
}

/// Build `OP_UPDATE_CLAIM <name> <claim id> <value> OP_2DROP OP_2DROP <pay script>`
pub fn build_update_script(
    name: &str,
    claim_id: &str,
    value: &[u8],
    pay_script: &[u8],
) -> Result<Vec<u8>, ScriptError> {
    let mut script = vec![OP_UPDATE_CLAIM];
    push_name(&mut script, name)?;
    push_claim_id(&mut script, claim_id)?;
    push_data(&mut script, value);
    script.extend_from_slice(&VALUE_DROP);
    script.extend_from_slice(pay_script);
    Ok(script)
}
