//! Command and environment vocabularies.
//!
//! Lookups take the bare name; callers strip a trailing `*` first with
//! [`base_name`].

use phf::{phf_map, phf_set};

/// Strip the star from `section*`-style names.
pub fn base_name(name: &str) -> &str {
    name.trim_end_matches('*')
}

/// Sectioning commands and their nesting level.
pub static SECTION_LEVELS: phf::Map<&'static str, u8> = phf_map! {
    "part" => 0u8,
    "chapter" => 1u8,
    "section" => 2u8,
    "subsection" => 3u8,
    "subsubsection" => 4u8,
    "paragraph" => 5u8,
    "subparagraph" => 6u8,
};

pub fn section_level(name: &str) -> Option<u8> {
    SECTION_LEVELS.get(base_name(name)).copied()
}

/// Label references resolved through the symbol table.
pub static REFERENCE_COMMANDS: phf::Set<&'static str> = phf_set! {
    "ref", "eqref", "pageref", "autoref", "cref", "Cref", "nameref", "vref",
};

/// Citation commands; their argument is a comma separated key list.
pub static CITATION_COMMANDS: phf::Set<&'static str> = phf_set! {
    "cite", "citep", "citet", "citeyear", "citeauthor", "nocite",
    "autocite", "parencite", "textcite", "footcite",
};

/// Bibliography plumbing handled together with citations.
pub static BIBLIOGRAPHY_COMMANDS: phf::Set<&'static str> = phf_set! {
    "bibliographystyle", "bibliography", "bibitem", "addbibresource", "printbibliography",
};

pub static AFFILIATION_COMMANDS: phf::Set<&'static str> = phf_set! {
    "affiliation", "affil", "institute", "address", "institution",
};

/// Front-matter and document-level commands.
pub static DOCUMENT_COMMANDS: phf::Set<&'static str> = phf_set! {
    "documentclass", "usepackage", "title", "author", "date", "maketitle",
    "institute", "abstract", "keywords", "thanks", "acknowledgements",
    "acknowledgments", "email", "orcid",
};

pub static MATH_COMMANDS: phf::Set<&'static str> = phf_set! {
    "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta",
    "theta", "vartheta", "iota", "kappa", "lambda", "mu", "nu", "xi", "pi",
    "rho", "sigma", "tau", "upsilon", "phi", "varphi", "chi", "psi", "omega",
    "Gamma", "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Phi", "Psi", "Omega",
    "frac", "sqrt", "sum", "prod", "int", "oint", "lim", "infty", "partial",
    "nabla", "cdot", "times", "leq", "geq", "neq", "approx", "equiv", "sim",
    "in", "subset", "subseteq", "cup", "cap", "forall", "exists", "rightarrow",
    "leftarrow", "Rightarrow", "Leftrightarrow", "mathbf", "mathrm", "mathcal",
    "mathbb", "boldsymbol", "operatorname", "equation", "align", "gather",
    "multline", "matrix", "cases",
};

pub static THEOREM_ENVIRONMENTS: phf::Set<&'static str> = phf_set! {
    "theorem", "lemma", "proposition", "corollary", "definition", "remark",
    "proof", "example", "notation", "claim", "conjecture", "assumption",
};

pub static FLOAT_COMMANDS: phf::Set<&'static str> = phf_set! {
    "figure", "table", "algorithm", "listing", "includegraphics", "caption",
    "subfigure", "subfloat", "subcaption",
};

pub static FLOAT_ENVIRONMENTS: phf::Set<&'static str> = phf_set! {
    "figure", "table", "algorithm", "listing", "subfigure", "wrapfigure",
};

/// Environments whose body is a single math expression.
pub static MATH_ENVIRONMENTS: phf::Set<&'static str> = phf_set! {
    "equation", "align", "gather", "multline", "eqnarray", "displaymath",
    "math", "flalign", "alignat",
};

/// Environments whose body is captured raw.
pub static VERBATIM_ENVIRONMENTS: phf::Set<&'static str> = phf_set! {
    "verbatim", "lstlisting", "minted", "comment", "Verbatim",
};

pub fn is_math_environment(name: &str) -> bool {
    MATH_ENVIRONMENTS.contains(base_name(name))
}

pub fn is_verbatim_environment(name: &str) -> bool {
    VERBATIM_ENVIRONMENTS.contains(base_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_levels() {
        assert_eq!(section_level("section"), Some(2));
        assert_eq!(section_level("subsection*"), Some(3));
        assert_eq!(section_level("textbf"), None);
    }

    #[test]
    fn test_environment_classes() {
        assert!(is_math_environment("align*"));
        assert!(is_verbatim_environment("lstlisting"));
        assert!(!is_math_environment("figure"));
    }
}
