use chrono::NaiveDate;
use eframe::egui::Color32;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Department {
    Executive,
    Engineering,
    Product,
    Design,
    Marketing,
    Sales,
    Finance,
    HumanResources,
    Operations,
    Legal,
}

impl Department {
    pub const ALL: [Department; 10] = [
        Self::Executive,
        Self::Engineering,
        Self::Product,
        Self::Design,
        Self::Marketing,
        Self::Sales,
        Self::Finance,
        Self::HumanResources,
        Self::Operations,
        Self::Legal,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Executive => "Executive",
            Self::Engineering => "Engineering",
            Self::Product => "Product",
            Self::Design => "Design",
            Self::Marketing => "Marketing",
            Self::Sales => "Sales",
            Self::Finance => "Finance",
            Self::HumanResources => "Human Resources",
            Self::Operations => "Operations",
            Self::Legal => "Legal",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::Executive => "executive",
            Self::Engineering => "engineering",
            Self::Product => "product",
            Self::Design => "design",
            Self::Marketing => "marketing",
            Self::Sales => "sales",
            Self::Finance => "finance",
            Self::HumanResources => "human-resources",
            Self::Operations => "operations",
            Self::Legal => "legal",
        }
    }

    pub fn color(self) -> Color32 {
        match self {
            Self::Executive => Color32::from_rgb(245, 190, 92),
            Self::Engineering => Color32::from_rgb(88, 166, 255),
            Self::Product => Color32::from_rgb(163, 113, 247),
            Self::Design => Color32::from_rgb(240, 120, 178),
            Self::Marketing => Color32::from_rgb(255, 145, 84),
            Self::Sales => Color32::from_rgb(86, 211, 148),
            Self::Finance => Color32::from_rgb(94, 201, 214),
            Self::HumanResources => Color32::from_rgb(229, 104, 104),
            Self::Operations => Color32::from_rgb(160, 172, 186),
            Self::Legal => Color32::from_rgb(196, 178, 128),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    DepartmentGroup,
    Executive,
    Manager,
    Employee,
}

impl NodeRole {
    pub fn is_grouping(self) -> bool {
        matches!(self, Self::DepartmentGroup)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::DepartmentGroup => "Department",
            Self::Executive => "Executive",
            Self::Manager => "Manager",
            Self::Employee => "Employee",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    ReportsTo,
    DepartmentMembership,
}

/// One person, or the invisible placeholder that groups a department.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OrgNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub department: Department,
    pub role: NodeRole,
    /// Hierarchy depth. Grouping nodes sit between levels (2.5).
    pub level: f32,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl OrgNode {
    pub fn is_grouping(&self) -> bool {
        self.role.is_grouping()
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(self.role.label())
    }
}

/// Directed relationship; `source` is the superior or grouping node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct OrgEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}
