//! Field-wise helpers shared by every layer struct

/// Implements merge, match, diff and field rendering for a layer struct whose
/// fields are all `Option<T>`. Unset (`None`) fields mean "don't care".
macro_rules! layer_fields {
    ($layer:ident { $($field:ident),+ $(,)? }) => {
        impl $layer {
            /// Overwrite every field of `self` that is set in `other`
            pub fn merge(&mut self, other: &Self) {
                $(
                    if let Some(value) = &other.$field {
                        self.$field = Some(value.clone());
                    }
                )+
            }

            /// Check that every field set in `self` holds the same value in `actual`
            pub fn matches(&self, actual: &Self) -> bool {
                $(
                    if let Some(want) = &self.$field {
                        if actual.$field.as_ref() != Some(want) {
                            return false;
                        }
                    }
                )+
                true
            }

            /// List the fields set in `want` whose value differs in `self`
            pub(crate) fn diff_fields(&self, want: &Self) -> Vec<$crate::layer::FieldDiff> {
                let mut diffs = Vec::new();
                $(
                    if let Some(wanted) = &want.$field {
                        if self.$field.as_ref() != Some(wanted) {
                            diffs.push($crate::layer::FieldDiff {
                                field: stringify!($field),
                                got: self.$field.as_ref().map($crate::layer::FieldValue::render),
                                want: $crate::layer::FieldValue::render(wanted),
                            });
                        }
                    }
                )+
                diffs
            }

            pub(crate) fn write_fields(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut fields: Vec<String> = Vec::new();
                $(
                    if let Some(value) = &self.$field {
                        fields.push(format!(
                            "{}: {}",
                            stringify!($field),
                            $crate::layer::FieldValue::render(value)
                        ));
                    }
                )+
                write!(f, "{}", fields.join(", "))
            }
        }
    };
}
