use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            inner: u32,
        }

        impl $name {
            /// Creates an id from a raw integer index.
            pub const fn new(id: u32) -> Self {
                Self { inner: id }
            }

            /// Returns the index as a usize for array access.
            pub const fn as_usize(self) -> usize {
                self.inner as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.inner)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(id: usize) -> Self {
                Self { inner: id as u32 }
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(id: $name) -> Self {
                id.inner as Self
            }
        }
    };
}

id_type!(
    /// Identifies a circuit within a netlist.
    CircuitId,
    "c"
);
id_type!(
    /// Identifies a device class within a netlist.
    DeviceClassId,
    "dc"
);
id_type!(
    /// Identifies a pin within a circuit.
    PinId,
    "p"
);
id_type!(
    /// Identifies a net within a circuit.
    NetId,
    "n"
);
id_type!(
    /// Identifies a device instance within a circuit.
    DeviceId,
    "d"
);
id_type!(
    /// Identifies a subcircuit instance within a circuit.
    SubCircuitId,
    "x"
);
