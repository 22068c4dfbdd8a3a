// Inquiry access codes
pub const NOT_DISCOVERABLE: u32 = 0x00;
pub const LIAC: u32 = 0x9E8B00;
pub const GIAC: u32 = 0x9E8B33;
pub const IAC_MIN: u32 = 0x9E8B00;
pub const IAC_MAX: u32 = 0x9E8B3F;

// Class of device masks
pub const CLASS_MASK: u32 = 0x00FF_FFFF;
pub const MAJOR_DEVICE_CLASS_MASK: u32 = 0x0000_1F00;
pub const MINOR_DEVICE_CLASS_MASK: u32 = 0x0000_00FC;
pub const SERVICE_CLASS_MASK: u32 = 0x00FF_E000;

// Major device classes
pub const MAJOR_MISCELLANEOUS: u32 = 0x0000;
pub const MAJOR_COMPUTER: u32 = 0x0100;
pub const MAJOR_PHONE: u32 = 0x0200;
pub const MAJOR_LAN_ACCESS: u32 = 0x0300;
pub const MAJOR_AUDIO: u32 = 0x0400;
pub const MAJOR_PERIPHERAL: u32 = 0x0500;
pub const MAJOR_IMAGING: u32 = 0x0600;
pub const MAJOR_UNCLASSIFIED: u32 = 0x1F00;
