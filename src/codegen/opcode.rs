use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Stack-machine instruction set.
///
/// The numbering is consumed by the runtime template of the emitter and must
/// never change. Branch instructions (`If*`, `WhileNotError`, `Match*`) are
/// followed by branch-length operands and their branch bodies inline;
/// positions are relative to the instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Opcode {
    PushUndefined = 1,
    PushNull = 2,
    PushFailed = 3,
    PushEmptyArray = 4,
    PushCurrPos = 5,
    Pop = 6,
    PopCurrPos = 7,
    /// `POP_N n`
    PopN = 8,
    Nip = 9,
    Append = 10,
    /// `WRAP n`
    Wrap = 11,
    Text = 12,
    /// `IF t f`
    If = 13,
    /// `IF_ERROR t f`
    IfError = 14,
    /// `IF_NOT_ERROR t f`
    IfNotError = 15,
    /// `WHILE_NOT_ERROR b`
    WhileNotError = 16,
    /// `MATCH_ANY a f`
    MatchAny = 17,
    /// `MATCH_STRING s a f`
    MatchString = 18,
    /// `MATCH_STRING_IC s a f`
    MatchStringIc = 19,
    /// `MATCH_CHAR_CLASS c a f`
    MatchCharClass = 20,
    /// `ACCEPT_N n`
    AcceptN = 21,
    /// `ACCEPT_STRING s`
    AcceptString = 22,
    /// `FAIL e`
    Fail = 23,
    /// `LOAD_SAVED_POS p`
    LoadSavedPos = 24,
    UpdateSavedPos = 25,
    /// `CALL f n pc p1 … pN`
    Call = 26,
    /// `RULE r`
    Rule = 27,
    SilentFailsOn = 28,
    SilentFailsOff = 29,
    PushEmptyString = 35,
    /// `PLUCK n k p1 … pk`
    Pluck = 41,
}
