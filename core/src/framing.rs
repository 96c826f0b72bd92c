use crate::command::Command;
use crate::config::ModemConfig;
use crate::error::{ModemError, Result};

/// Expand `value` into `width` bits, most significant bit first
pub fn to_bits(value: u16, width: u8) -> Vec<bool> {
    (0..width).rev().map(|i| (value >> i) & 1 == 1).collect()
}

/// Inverse of [`to_bits`]
pub fn from_bits(bits: &[bool]) -> u16 {
    bits.iter().fold(0u16, |acc, &bit| (acc << 1) | bit as u16)
}

/// Checksum bits for a data field.
///
/// Bit `i` is the complement of data bit `i mod data.len()`, so an all-mark
/// or all-space burst can never carry a valid checksum.
pub fn checksum(data: &[bool], width: u8) -> Vec<bool> {
    if data.is_empty() {
        return vec![true; width as usize];
    }
    (0..width as usize).map(|i| !data[i % data.len()]).collect()
}

/// Bit content of one frame, in transmission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBits {
    pub data: Vec<bool>,
    pub checksum: Vec<bool>,
}

impl FrameBits {
    pub fn for_command(command: Command, config: &ModemConfig) -> Self {
        Self::for_value(command.value(), config)
    }

    /// Frame for an arbitrary value, including values outside the command table
    pub fn for_value(value: u16, config: &ModemConfig) -> Self {
        let data = to_bits(value, config.data_bits);
        let checksum = checksum(&data, config.checksum_bits);
        Self { data, checksum }
    }

    /// Split a received bit sequence into its data and checksum fields
    pub fn from_received(bits: &[bool], config: &ModemConfig) -> Result<Self> {
        if bits.len() != config.frame_bits() {
            return Err(ModemError::InvalidConfig(format!(
                "expected {} frame bits, got {}",
                config.frame_bits(),
                bits.len()
            )));
        }
        let (data, checksum) = bits.split_at(config.data_bits as usize);
        Ok(Self {
            data: data.to_vec(),
            checksum: checksum.to_vec(),
        })
    }

    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        self.data.iter().chain(self.checksum.iter()).copied()
    }

    pub fn len(&self) -> usize {
        self.data.len() + self.checksum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invert the bit at `index` (counted across data then checksum)
    pub fn flip(&mut self, index: usize) {
        if index < self.data.len() {
            self.data[index] = !self.data[index];
        } else if let Some(bit) = self.checksum.get_mut(index - self.data.len()) {
            *bit = !*bit;
        }
    }

    pub fn data_value(&self) -> u16 {
        from_bits(&self.data)
    }

    pub fn checksum_value(&self) -> u16 {
        from_bits(&self.checksum)
    }

    pub fn is_consistent(&self) -> bool {
        checksum(&self.data, self.checksum.len() as u8) == self.checksum
    }
}
