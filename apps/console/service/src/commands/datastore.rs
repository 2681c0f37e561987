use super::ParamSource::{Body, Path, Query};
use super::{HttpMethod, OperationDescriptor, ParamSpec};

pub fn descriptors() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "datastore.pool.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("filter", Query, -2),
                ParamSpec::number("start", Query, -1),
                ParamSpec::number("end", Query, -1),
            ],
        ),
        OperationDescriptor::new(
            "datastore.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("decrypt", Query, false),
            ],
        ),
        OperationDescriptor::new(
            "datastore.allocate",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::text("template", Body, ""),
                ParamSpec::number("cluster", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "datastore.update",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
                ParamSpec::flag("merge", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "datastore.enable",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("enable", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "datastore.rename",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("name", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "datastore.delete",
            HttpMethod::Delete,
            true,
            vec![ParamSpec::number("id", Path, -1)],
        ),
    ]
}
