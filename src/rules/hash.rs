const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Smallest id the rule engine accepts
pub const MIN_RULE_ID: u32 = 1;
/// Largest id the rule engine accepts
pub const MAX_RULE_ID: u32 = 2_147_483_647;

/// 32-bit FNV-1a over the UTF-8 bytes of `input`
pub fn fnv1a_32(input: &str) -> u32 {
    input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Fold the FNV-1a hash of `input` into `[MIN_RULE_ID, MAX_RULE_ID]`.
///
/// The output is part of the installed state: changing this function
/// renumbers every rule on upgrade.
pub fn hash_to_int(input: &str) -> u32 {
    fnv1a_32(input) % (MAX_RULE_ID - 1) + MIN_RULE_ID
}

/// Stable id of the rule compiled for one profile/matcher pair
pub fn rule_id(profile_id: &str, matcher_id: &str) -> u32 {
    hash_to_int(&format!("{}:{}:reqres", profile_id, matcher_id))
}
