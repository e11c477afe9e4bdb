/// Nombre de cada vista de la app
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteName {
    Login,
    Register,
    Home,
    Admin,
    CourseDetail,
}

/// Metadatos de la ruta que consulta la guardia
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
}

/// Ruta resuelta (con el parámetro `:id` cuando corresponde)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub name: RouteName,
    pub course_id: Option<String>,
}

struct RouteDef {
    name: RouteName,
    pattern: &'static str,
    meta: RouteMeta,
}

const ROUTES: &[RouteDef] = &[
    RouteDef {
        name: RouteName::Login,
        pattern: "/login",
        meta: RouteMeta { requires_auth: false },
    },
    RouteDef {
        name: RouteName::Register,
        pattern: "/register",
        meta: RouteMeta { requires_auth: false },
    },
    RouteDef {
        name: RouteName::Home,
        pattern: "/",
        meta: RouteMeta { requires_auth: true },
    },
    RouteDef {
        name: RouteName::Admin,
        pattern: "/admin",
        meta: RouteMeta { requires_auth: true },
    },
    RouteDef {
        name: RouteName::CourseDetail,
        pattern: "/cursos/:id",
        meta: RouteMeta { requires_auth: true },
    },
];

fn definition(name: RouteName) -> &'static RouteDef {
    // ROUTES cubre todas las variantes
    ROUTES
        .iter()
        .find(|def| def.name == name)
        .unwrap_or(&ROUTES[0])
}

impl RouteName {
    pub fn meta(self) -> RouteMeta {
        definition(self).meta
    }

    /// Rutas de acceso (login/registro)
    pub fn is_auth_entry(self) -> bool {
        matches!(self, RouteName::Login | RouteName::Register)
    }
}

impl Route {
    pub fn new(name: RouteName) -> Self {
        Self {
            name,
            course_id: None,
        }
    }

    pub fn course_detail(id: impl Into<String>) -> Self {
        Self {
            name: RouteName::CourseDetail,
            course_id: Some(id.into()),
        }
    }

    pub fn meta(&self) -> RouteMeta {
        self.name.meta()
    }

    /// Resolver un path; `None` si no corresponde a ninguna ruta.
    /// Ignora query string, fragmento y `/` final.
    pub fn resolve(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

        ROUTES.iter().find_map(|def| {
            let pattern: Vec<&str> = def.pattern.split('/').filter(|s| !s.is_empty()).collect();
            if pattern.len() != segments.len() {
                return None;
            }
            let mut course_id = None;
            for (expected, actual) in pattern.iter().zip(&segments) {
                if *expected == ":id" {
                    course_id = Some(actual.to_string());
                } else if expected != actual {
                    return None;
                }
            }
            Some(Route {
                name: def.name,
                course_id,
            })
        })
    }

    pub fn path(&self) -> String {
        let pattern = definition(self.name).pattern;
        match &self.course_id {
            Some(id) => pattern.replace(":id", id),
            None => pattern.to_string(),
        }
    }
}
