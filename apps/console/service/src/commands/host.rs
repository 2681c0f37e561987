use super::ParamSource::{Body, Path, Query};
use super::{HttpMethod, OperationDescriptor, ParamSpec};

pub fn descriptors() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "host.pool.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("filter", Query, -2),
                ParamSpec::number("start", Query, -1),
                ParamSpec::number("end", Query, -1),
            ],
        ),
        OperationDescriptor::new(
            "host.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("decrypt", Query, false),
            ],
        ),
        OperationDescriptor::new(
            "host.monitoring",
            HttpMethod::Get,
            true,
            vec![ParamSpec::number("id", Path, -1)],
        ),
        OperationDescriptor::new(
            "host.allocate",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::text("hostname", Body, ""),
                ParamSpec::text("im_mad", Body, ""),
                ParamSpec::text("vm_mad", Body, ""),
                ParamSpec::number("cluster", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "host.status",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::number("status", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "host.rename",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("name", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "host.update",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
                ParamSpec::flag("merge", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "host.delete",
            HttpMethod::Delete,
            true,
            vec![ParamSpec::number("id", Path, -1)],
        ),
    ]
}
