//! Built-in task, function and method signatures relevant to usage.
//!
//! Most system calls only read their arguments. The ones below write through
//! one or more argument positions and must count as drivers.

use crate::design::Direction;

/// Container and string methods that modify their receiver.
const MUTATING_METHODS: &[&str] = &[
    "push_back",
    "push_front",
    "pop_back",
    "pop_front",
    "insert",
    "delete",
    "sort",
    "rsort",
    "reverse",
    "shuffle",
    "putc",
    "itoa",
    "hextoa",
    "octtoa",
    "bintoa",
    "realtoa",
];

/// Calls whose every argument is an output.
const RANDOMIZE_CALLS: &[&str] = &["randomize", "std::randomize", "$randomize"];

/// Calls whose first argument is a seed updated in place.
const SEEDED_CALLS: &[&str] = &["$random", "$urandom"];

pub fn is_mutating_method(method: &str) -> bool {
    MUTATING_METHODS.contains(&method)
}

pub fn is_randomize(name: &str) -> bool {
    RANDOMIZE_CALLS.contains(&name)
}

/// Direction of argument `index` of the system call `name`.
pub fn arg_direction(name: &str, index: usize) -> Direction {
    if is_randomize(name) {
        return Direction::Out;
    }
    if index == 0 && (SEEDED_CALLS.contains(&name) || name.starts_with("$dist_")) {
        return Direction::InOut;
    }
    let output = match name {
        "$cast" | "$fgets" | "$fread" | "$sformat" => index == 0,
        "$sscanf" | "$fscanf" => index >= 2,
        "$value$plusargs" | "$readmemh" | "$readmemb" => index == 1,
        _ if name.starts_with("$swrite") => index == 0,
        _ => false,
    };
    if output {
        Direction::Out
    } else {
        Direction::In
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_destination() {
        assert_eq!(arg_direction("$cast", 0), Direction::Out);
        assert_eq!(arg_direction("$cast", 1), Direction::In);
    }

    #[test]
    fn test_scanf_outputs_start_at_third_argument() {
        assert_eq!(arg_direction("$sscanf", 0), Direction::In);
        assert_eq!(arg_direction("$sscanf", 1), Direction::In);
        assert_eq!(arg_direction("$sscanf", 2), Direction::Out);
        assert_eq!(arg_direction("$fscanf", 5), Direction::Out);
    }

    #[test]
    fn test_swrite_family() {
        assert_eq!(arg_direction("$swriteh", 0), Direction::Out);
        assert_eq!(arg_direction("$swrite", 1), Direction::In);
    }

    #[test]
    fn test_seeds_are_inout() {
        assert_eq!(arg_direction("$random", 0), Direction::InOut);
        assert_eq!(arg_direction("$dist_uniform", 0), Direction::InOut);
        assert_eq!(arg_direction("$dist_uniform", 1), Direction::In);
    }

    #[test]
    fn test_randomize_writes_everything() {
        assert_eq!(arg_direction("std::randomize", 3), Direction::Out);
    }

    #[test]
    fn test_display_reads() {
        assert_eq!(arg_direction("$display", 0), Direction::In);
    }

    #[test]
    fn test_mutating_methods() {
        assert!(is_mutating_method("push_back"));
        assert!(is_mutating_method("itoa"));
        assert!(!is_mutating_method("size"));
        assert!(!is_mutating_method("len"));
    }
}
