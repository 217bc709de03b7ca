//! Register snapshot captured at exception time.

/// CPSR bit 5 (T) selects the instruction set in force at a given PC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionSet {
    Arm,
    Thumb,
}

impl InstructionSet {
    /// Width in bytes of an instruction encoded in this set ("falls through to `PC + width`
    /// otherwise" per the predictor's non-goals).
    pub fn width(self) -> u32 {
        match self {
            InstructionSet::Arm => 4,
            InstructionSet::Thumb => 2,
        }
    }
}

/// Thin wrapper over CPSR with the bit accessors the coordinator and predictor need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cpsr(pub u32);

const T_BIT: u32 = 1 << 5;
const MODE_MASK: u32 = 0x1F;
const USER_MODE: u32 = 0x10;

impl Cpsr {
    pub fn instruction_set(self) -> InstructionSet {
        if self.0 & T_BIT != 0 {
            InstructionSet::Thumb
        } else {
            InstructionSet::Arm
        }
    }

    pub fn is_user_mode(self) -> bool {
        self.0 & MODE_MASK == USER_MODE
    }

    pub fn n(self) -> bool {
        self.0 & (1 << 31) != 0
    }
    pub fn z(self) -> bool {
        self.0 & (1 << 30) != 0
    }
    pub fn c(self) -> bool {
        self.0 & (1 << 29) != 0
    }
    pub fn v(self) -> bool {
        self.0 & (1 << 28) != 0
    }

    /// Evaluate one of the sixteen ARM condition codes against N/Z/C/V.
    pub fn condition_holds(self, cond: u32) -> bool {
        match cond & 0xF {
            0x0 => self.z(),                      // EQ
            0x1 => !self.z(),                     // NE
            0x2 => self.c(),                      // CS/HS
            0x3 => !self.c(),                     // CC/LO
            0x4 => self.n(),                      // MI
            0x5 => !self.n(),                     // PL
            0x6 => self.v(),                      // VS
            0x7 => !self.v(),                     // VC
            0x8 => self.c() && !self.z(),         // HI
            0x9 => !self.c() || self.z(),         // LS
            0xA => self.n() == self.v(),          // GE
            0xB => self.n() != self.v(),          // LT
            0xC => !self.z() && (self.n() == self.v()), // GT
            0xD => self.z() || (self.n() != self.v()),  // LE
            0xE => true,                          // AL
            _ => false,                           // NV
        }
    }
}

/// The sixteen general registers + CPSR of a thread interrupted by a synchronous exception,
/// captured from the user-mode view when the CPU was in user mode, else from the kernel view.
#[derive(Debug, Clone, Copy)]
pub struct RegisterSnapshot {
    pub regs: [u32; 16],
    pub cpsr: Cpsr,
}

impl RegisterSnapshot {
    pub fn pc(&self) -> u32 {
        self.regs[15]
    }

    pub fn lr(&self) -> u32 {
        self.regs[14]
    }

    pub fn fp(&self) -> u32 {
        self.regs[11]
    }

    pub fn instruction_set(&self) -> InstructionSet {
        self.cpsr.instruction_set()
    }

    pub fn dump(&self) -> String {
        let mut dump = String::new();
        dump.push_str(&format!("PC={:08X} CPSR={:08X}\n", self.pc(), self.cpsr.0));
        for r in 0..16 {
            dump.push_str(&format!("r{:<3}={:08X} ", r, self.regs[r]));
            if r & 3 == 3 {
                dump.push('\n');
            }
        }
        dump
    }
}
