//! `ioctl` request encoding for BSD-derivatives.

const IOCPARM_SHIFT: u32 = 13;

pub(crate) const MAX_ARG_SIZE: usize = (1 << IOCPARM_SHIFT) - 1;

pub(crate) const IOC_IN: u32 = 0x80000000;

#[expect(non_snake_case)]
pub(crate) const fn _IOC(dir: u32, group: u32, num: u32, len: u32) -> u32 {
    dir | len << 16 | group << 8 | num
}
