/// Source code constants to ensure consistency across the codebase.
/// These are the codes the registry, orchestrator, and CLI agree on.

// SRU/MARC national-library family
pub const LOC: &str = "loc";
pub const BNF: &str = "bnf";
pub const DNB: &str = "dnb";
pub const K10PLUS: &str = "k10plus";
pub const SUDOC: &str = "sudoc";
pub const BNE: &str = "bne";
pub const SLSP: &str = "slsp";

// Individually coded catalogs
pub const LIBRIS: &str = "libris";
pub const CERL_HPB: &str = "cerl_hpb";
pub const KB_NL: &str = "kb_nl";
pub const LIBRARY_HUB: &str = "library_hub";
pub const BNP: &str = "bnp";
pub const NDL: &str = "ndl";
pub const DANBIB: &str = "danbib";
pub const OPEN_LIBRARY: &str = "open_library";
pub const GOOGLE_BOOKS: &str = "google_books";
pub const FINNA: &str = "finna";
pub const OPAC_SBN: &str = "opac_sbn";
pub const TROVE: &str = "trove";
pub const EUROPEANA: &str = "europeana";
pub const HATHITRUST: &str = "hathitrust";
pub const COBISS: &str = "cobiss";
pub const BOL_NL: &str = "bol_nl";
pub const STANDAARD: &str = "standaard";

/// All source codes the registry can construct, in default priority order.
pub fn supported_sources() -> Vec<&'static str> {
    vec![
        OPEN_LIBRARY,
        GOOGLE_BOOKS,
        LOC,
        DNB,
        K10PLUS,
        BNF,
        SUDOC,
        BNE,
        SLSP,
        LIBRIS,
        KB_NL,
        LIBRARY_HUB,
        CERL_HPB,
        BNP,
        NDL,
        DANBIB,
        FINNA,
        OPAC_SBN,
        TROVE,
        EUROPEANA,
        HATHITRUST,
        COBISS,
        BOL_NL,
        STANDAARD,
    ]
}
