crate::define_id_enum! {
    /// Identifier selecting which builder strategy applies to a package
    BuildSystemKind {
        Cargo => "cargo" : "Cargo",
        Go => "go" : "Go" | "go-mod",
        CMake => "cmake" : "CMake",
        Autotools => "autotools" : "Autotools" | "autoconf",
        Makefile => "makefile" : "Makefile" | "make",
    }
}

impl std::str::FromStr for BuildSystemKind {
    type Err = super::SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| super::SpecError::UnknownBuildSystem(s.to_string()))
    }
}
