// ---------------------------------------------------------------------------
// Schema descriptor shared by the projector, loader and query engine
// ---------------------------------------------------------------------------

/// How the loader interprets the cells of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    /// Kept verbatim, even when the text looks numeric ("500", "1500 XL").
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// An ordered list of typed columns. Order is the projection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub columns: &'static [ColumnDef],
}

pub const YEAR: &str = "Year";
pub const MAKE: &str = "Make";
pub const MODEL: &str = "Model";
pub const FUEL_TYPE_1: &str = "Fuel Type 1";
pub const FUEL_TYPE_2: &str = "Fuel Type 2";
pub const ANNUAL_COST_FT1: &str = "Annual Fuel Cost (FT1)";
pub const ANNUAL_COST_FT2: &str = "Annual Fuel Cost (FT2)";

/// Columns retained from the EPA fuel-economy `database.csv`.
pub const FUEL_ECONOMY: Schema = Schema {
    columns: &[
        ColumnDef { name: YEAR, kind: ColumnKind::Integer },
        ColumnDef { name: MAKE, kind: ColumnKind::Text },
        ColumnDef { name: MODEL, kind: ColumnKind::Text },
        ColumnDef { name: FUEL_TYPE_1, kind: ColumnKind::Text },
        ColumnDef { name: FUEL_TYPE_2, kind: ColumnKind::Text },
        ColumnDef { name: ANNUAL_COST_FT1, kind: ColumnKind::Float },
        ColumnDef { name: ANNUAL_COST_FT2, kind: ColumnKind::Float },
    ],
};

/// Columns the free-text search looks at.
pub const SEARCH_COLUMNS: &[&str] = &[MAKE, MODEL];

impl Schema {
    pub fn names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column kind, falling back to `Text` for columns outside the schema.
    pub fn kind_of(&self, name: &str) -> ColumnKind {
        self.get(name).map(|c| c.kind).unwrap_or(ColumnKind::Text)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuel_economy_columns_are_in_projection_order() {
        assert_eq!(
            FUEL_ECONOMY.names(),
            vec![
                "Year",
                "Make",
                "Model",
                "Fuel Type 1",
                "Fuel Type 2",
                "Annual Fuel Cost (FT1)",
                "Annual Fuel Cost (FT2)",
            ]
        );
    }

    #[test]
    fn lookup_is_exact() {
        assert_eq!(FUEL_ECONOMY.kind_of("Year"), ColumnKind::Integer);
        assert_eq!(FUEL_ECONOMY.kind_of(ANNUAL_COST_FT2), ColumnKind::Float);
        assert!(FUEL_ECONOMY.get("year").is_none());
        assert!(FUEL_ECONOMY.get("Annual Fuel Cost(FT1)").is_none());
        assert_eq!(FUEL_ECONOMY.kind_of("Cylinders"), ColumnKind::Text);
    }
}
