// Included directly into `cpu.rs`: the 256-entry opcode decode table.
//
// Unmapped slots default to `Unofficial`/`Implied`/2 cycles (§9, declared
// gap). The common single- and double-byte unofficial NOP families are
// still given their real addressing mode so the instruction stream stays in
// sync with ROMs that happen to execute one; they are still *dispatched* as
// a plain NOP (see `Mnemonic::Unofficial` in `execute`).

use AddressingMode::*;
use Mnemonic::*;

const fn build_table() -> [OpcodeEntry; 256] {
    let mut table = [op(Unofficial, Implied, 2); 256];

    // Loads.
    table[0xA9] = op(Lda, Immediate, 2);
    table[0xA5] = op(Lda, ZeroPage, 3);
    table[0xB5] = op(Lda, ZeroPageX, 4);
    table[0xAD] = op(Lda, Absolute, 4);
    table[0xBD] = op(Lda, AbsoluteX, 4);
    table[0xB9] = op(Lda, AbsoluteY, 4);
    table[0xA1] = op(Lda, IndirectX, 6);
    table[0xB1] = op(Lda, IndirectY, 5);

    table[0xA2] = op(Ldx, Immediate, 2);
    table[0xA6] = op(Ldx, ZeroPage, 3);
    table[0xB6] = op(Ldx, ZeroPageY, 4);
    table[0xAE] = op(Ldx, Absolute, 4);
    table[0xBE] = op(Ldx, AbsoluteY, 4);

    table[0xA0] = op(Ldy, Immediate, 2);
    table[0xA4] = op(Ldy, ZeroPage, 3);
    table[0xB4] = op(Ldy, ZeroPageX, 4);
    table[0xAC] = op(Ldy, Absolute, 4);
    table[0xBC] = op(Ldy, AbsoluteX, 4);

    // Stores.
    table[0x85] = op(Sta, ZeroPage, 3);
    table[0x95] = op(Sta, ZeroPageX, 4);
    table[0x8D] = op(Sta, Absolute, 4);
    table[0x9D] = op(Sta, AbsoluteX, 5);
    table[0x99] = op(Sta, AbsoluteY, 5);
    table[0x81] = op(Sta, IndirectX, 6);
    table[0x91] = op(Sta, IndirectY, 6);

    table[0x86] = op(Stx, ZeroPage, 3);
    table[0x96] = op(Stx, ZeroPageY, 4);
    table[0x8E] = op(Stx, Absolute, 4);

    table[0x84] = op(Sty, ZeroPage, 3);
    table[0x94] = op(Sty, ZeroPageX, 4);
    table[0x8C] = op(Sty, Absolute, 4);

    // Register transfers.
    table[0xAA] = op(Tax, Implied, 2);
    table[0xA8] = op(Tay, Implied, 2);
    table[0x8A] = op(Txa, Implied, 2);
    table[0x98] = op(Tya, Implied, 2);
    table[0xBA] = op(Tsx, Implied, 2);
    table[0x9A] = op(Txs, Implied, 2);

    // Stack.
    table[0x48] = op(Pha, Implied, 3);
    table[0x08] = op(Php, Implied, 3);
    table[0x68] = op(Pla, Implied, 4);
    table[0x28] = op(Plp, Implied, 4);

    // Logical.
    table[0x29] = op(And, Immediate, 2);
    table[0x25] = op(And, ZeroPage, 3);
    table[0x35] = op(And, ZeroPageX, 4);
    table[0x2D] = op(And, Absolute, 4);
    table[0x3D] = op(And, AbsoluteX, 4);
    table[0x39] = op(And, AbsoluteY, 4);
    table[0x21] = op(And, IndirectX, 6);
    table[0x31] = op(And, IndirectY, 5);

    table[0x09] = op(Ora, Immediate, 2);
    table[0x05] = op(Ora, ZeroPage, 3);
    table[0x15] = op(Ora, ZeroPageX, 4);
    table[0x0D] = op(Ora, Absolute, 4);
    table[0x1D] = op(Ora, AbsoluteX, 4);
    table[0x19] = op(Ora, AbsoluteY, 4);
    table[0x01] = op(Ora, IndirectX, 6);
    table[0x11] = op(Ora, IndirectY, 5);

    table[0x49] = op(Eor, Immediate, 2);
    table[0x45] = op(Eor, ZeroPage, 3);
    table[0x55] = op(Eor, ZeroPageX, 4);
    table[0x4D] = op(Eor, Absolute, 4);
    table[0x5D] = op(Eor, AbsoluteX, 4);
    table[0x59] = op(Eor, AbsoluteY, 4);
    table[0x41] = op(Eor, IndirectX, 6);
    table[0x51] = op(Eor, IndirectY, 5);

    table[0x24] = op(Bit, ZeroPage, 3);
    table[0x2C] = op(Bit, Absolute, 4);

    // Arithmetic.
    table[0x69] = op(Adc, Immediate, 2);
    table[0x65] = op(Adc, ZeroPage, 3);
    table[0x75] = op(Adc, ZeroPageX, 4);
    table[0x6D] = op(Adc, Absolute, 4);
    table[0x7D] = op(Adc, AbsoluteX, 4);
    table[0x79] = op(Adc, AbsoluteY, 4);
    table[0x61] = op(Adc, IndirectX, 6);
    table[0x71] = op(Adc, IndirectY, 5);

    table[0xE9] = op(Sbc, Immediate, 2);
    table[0xE5] = op(Sbc, ZeroPage, 3);
    table[0xF5] = op(Sbc, ZeroPageX, 4);
    table[0xED] = op(Sbc, Absolute, 4);
    table[0xFD] = op(Sbc, AbsoluteX, 4);
    table[0xF9] = op(Sbc, AbsoluteY, 4);
    table[0xE1] = op(Sbc, IndirectX, 6);
    table[0xF1] = op(Sbc, IndirectY, 5);

    table[0xC9] = op(Cmp, Immediate, 2);
    table[0xC5] = op(Cmp, ZeroPage, 3);
    table[0xD5] = op(Cmp, ZeroPageX, 4);
    table[0xCD] = op(Cmp, Absolute, 4);
    table[0xDD] = op(Cmp, AbsoluteX, 4);
    table[0xD9] = op(Cmp, AbsoluteY, 4);
    table[0xC1] = op(Cmp, IndirectX, 6);
    table[0xD1] = op(Cmp, IndirectY, 5);

    table[0xE0] = op(Cpx, Immediate, 2);
    table[0xE4] = op(Cpx, ZeroPage, 3);
    table[0xEC] = op(Cpx, Absolute, 4);

    table[0xC0] = op(Cpy, Immediate, 2);
    table[0xC4] = op(Cpy, ZeroPage, 3);
    table[0xCC] = op(Cpy, Absolute, 4);

    // Increments/decrements.
    table[0xE6] = op(Inc, ZeroPage, 5);
    table[0xF6] = op(Inc, ZeroPageX, 6);
    table[0xEE] = op(Inc, Absolute, 6);
    table[0xFE] = op(Inc, AbsoluteX, 7);

    table[0xC6] = op(Dec, ZeroPage, 5);
    table[0xD6] = op(Dec, ZeroPageX, 6);
    table[0xCE] = op(Dec, Absolute, 6);
    table[0xDE] = op(Dec, AbsoluteX, 7);

    table[0xE8] = op(Inx, Implied, 2);
    table[0xC8] = op(Iny, Implied, 2);
    table[0xCA] = op(Dex, Implied, 2);
    table[0x88] = op(Dey, Implied, 2);

    // Shifts/rotates.
    table[0x0A] = op(Asl, Accumulator, 2);
    table[0x06] = op(Asl, ZeroPage, 5);
    table[0x16] = op(Asl, ZeroPageX, 6);
    table[0x0E] = op(Asl, Absolute, 6);
    table[0x1E] = op(Asl, AbsoluteX, 7);

    table[0x4A] = op(Lsr, Accumulator, 2);
    table[0x46] = op(Lsr, ZeroPage, 5);
    table[0x56] = op(Lsr, ZeroPageX, 6);
    table[0x4E] = op(Lsr, Absolute, 6);
    table[0x5E] = op(Lsr, AbsoluteX, 7);

    table[0x2A] = op(Rol, Accumulator, 2);
    table[0x26] = op(Rol, ZeroPage, 5);
    table[0x36] = op(Rol, ZeroPageX, 6);
    table[0x2E] = op(Rol, Absolute, 6);
    table[0x3E] = op(Rol, AbsoluteX, 7);

    table[0x6A] = op(Ror, Accumulator, 2);
    table[0x66] = op(Ror, ZeroPage, 5);
    table[0x76] = op(Ror, ZeroPageX, 6);
    table[0x6E] = op(Ror, Absolute, 6);
    table[0x7E] = op(Ror, AbsoluteX, 7);

    // Jumps/calls.
    table[0x4C] = op(Jmp, Absolute, 3);
    table[0x6C] = op(Jmp, Indirect, 5);
    table[0x20] = op(Jsr, Absolute, 6);
    table[0x60] = op(Rts, Implied, 6);
    table[0x00] = op(Brk, Implied, 7);
    table[0x40] = op(Rti, Implied, 6);

    // Branches.
    table[0x90] = op(Bcc, Relative, 2);
    table[0xB0] = op(Bcs, Relative, 2);
    table[0xF0] = op(Beq, Relative, 2);
    table[0xD0] = op(Bne, Relative, 2);
    table[0x30] = op(Bmi, Relative, 2);
    table[0x10] = op(Bpl, Relative, 2);
    table[0x50] = op(Bvc, Relative, 2);
    table[0x70] = op(Bvs, Relative, 2);

    // Status flag changes.
    table[0x18] = op(Clc, Implied, 2);
    table[0x38] = op(Sec, Implied, 2);
    table[0x58] = op(Cli, Implied, 2);
    table[0x78] = op(Sei, Implied, 2);
    table[0xB8] = op(Clv, Implied, 2);
    table[0xD8] = op(Cld, Implied, 2);
    table[0xF8] = op(Sed, Implied, 2);

    table[0xEA] = op(Nop, Implied, 2);

    // Common unofficial NOP families: real addressing mode so the operand
    // bytes stay in sync, still dispatched as `Unofficial` (a NOP).
    table[0x1A] = op(Unofficial, Implied, 2);
    table[0x3A] = op(Unofficial, Implied, 2);
    table[0x5A] = op(Unofficial, Implied, 2);
    table[0x7A] = op(Unofficial, Implied, 2);
    table[0xDA] = op(Unofficial, Implied, 2);
    table[0xFA] = op(Unofficial, Implied, 2);

    table[0x80] = op(Unofficial, Immediate, 2);
    table[0x82] = op(Unofficial, Immediate, 2);
    table[0x89] = op(Unofficial, Immediate, 2);
    table[0xC2] = op(Unofficial, Immediate, 2);
    table[0xE2] = op(Unofficial, Immediate, 2);

    table[0x04] = op(Unofficial, ZeroPage, 3);
    table[0x44] = op(Unofficial, ZeroPage, 3);
    table[0x64] = op(Unofficial, ZeroPage, 3);

    table[0x14] = op(Unofficial, ZeroPageX, 4);
    table[0x34] = op(Unofficial, ZeroPageX, 4);
    table[0x54] = op(Unofficial, ZeroPageX, 4);
    table[0x74] = op(Unofficial, ZeroPageX, 4);
    table[0xD4] = op(Unofficial, ZeroPageX, 4);
    table[0xF4] = op(Unofficial, ZeroPageX, 4);

    table[0x0C] = op(Unofficial, Absolute, 4);

    table[0x1C] = op(Unofficial, AbsoluteX, 4);
    table[0x3C] = op(Unofficial, AbsoluteX, 4);
    table[0x5C] = op(Unofficial, AbsoluteX, 4);
    table[0x7C] = op(Unofficial, AbsoluteX, 4);
    table[0xDC] = op(Unofficial, AbsoluteX, 4);
    table[0xFC] = op(Unofficial, AbsoluteX, 4);

    table
}

const OPCODE_TABLE: [OpcodeEntry; 256] = build_table();
