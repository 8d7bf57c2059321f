/// Predefined role names.
pub mod roles {
    pub const ADMIN: &str = "ADMIN";
    pub const MANAGER: &str = "MANAGER";
    pub const ACCOUNTANT: &str = "ACCOUNTANT";
    pub const SUPPORT: &str = "SUPPORT";
    pub const USER: &str = "USER";
}

/// Predefined permission names.
pub mod permissions {
    pub const READ_USERS: &str = "READ_USERS";
    pub const CREATE_USERS: &str = "CREATE_USERS";
    pub const UPDATE_USERS: &str = "UPDATE_USERS";
    pub const DELETE_USERS: &str = "DELETE_USERS";
    pub const MANAGE_FINANCES: &str = "MANAGE_FINANCES";
    pub const VIEW_REPORTS: &str = "VIEW_REPORTS";
    pub const MANAGE_TEAM: &str = "MANAGE_TEAM";
    pub const READ_OWN_DATA: &str = "READ_OWN_DATA";
    pub const UPDATE_OWN_DATA: &str = "UPDATE_OWN_DATA";
}

/// Roles that may act on other users' accounts.
pub const PRIVILEGED_ROLES: &[&str] = &[roles::ADMIN, roles::MANAGER];

/// Permission catalog seeded at bootstrap: (name, description).
pub const PERMISSION_CATALOG: &[(&str, &str)] = &[
    (permissions::READ_USERS, "Can view users"),
    (permissions::CREATE_USERS, "Can create users"),
    (permissions::UPDATE_USERS, "Can update users"),
    (permissions::DELETE_USERS, "Can delete users"),
    (permissions::MANAGE_FINANCES, "Can manage finances"),
    (permissions::VIEW_REPORTS, "Can view financial reports"),
    (permissions::MANAGE_TEAM, "Can manage team members"),
    (permissions::READ_OWN_DATA, "Can read own data"),
    (permissions::UPDATE_OWN_DATA, "Can update own data"),
];

/// A role with its fixed permission bundle.
pub struct RoleBundle {
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: &'static [&'static str],
}

/// Role catalog seeded at bootstrap.
pub const ROLE_BUNDLES: &[RoleBundle] = &[
    RoleBundle {
        name: roles::ADMIN,
        description: "Administrator with full access",
        permissions: &[
            permissions::READ_USERS,
            permissions::CREATE_USERS,
            permissions::UPDATE_USERS,
            permissions::DELETE_USERS,
            permissions::MANAGE_FINANCES,
            permissions::VIEW_REPORTS,
            permissions::MANAGE_TEAM,
            permissions::READ_OWN_DATA,
            permissions::UPDATE_OWN_DATA,
        ],
    },
    RoleBundle {
        name: roles::MANAGER,
        description: "Manager with team management rights",
        permissions: &[
            permissions::READ_USERS,
            permissions::CREATE_USERS,
            permissions::MANAGE_TEAM,
            permissions::VIEW_REPORTS,
            permissions::READ_OWN_DATA,
            permissions::UPDATE_OWN_DATA,
        ],
    },
    RoleBundle {
        name: roles::ACCOUNTANT,
        description: "Accountant with financial access",
        permissions: &[
            permissions::MANAGE_FINANCES,
            permissions::VIEW_REPORTS,
            permissions::READ_OWN_DATA,
            permissions::UPDATE_OWN_DATA,
        ],
    },
    RoleBundle {
        name: roles::SUPPORT,
        description: "Support team member",
        permissions: &[permissions::READ_USERS, permissions::READ_OWN_DATA],
    },
    RoleBundle {
        name: roles::USER,
        description: "Regular user",
        permissions: &[permissions::READ_OWN_DATA, permissions::UPDATE_OWN_DATA],
    },
];
