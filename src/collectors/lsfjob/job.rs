use crate::collectors::parse::lenient;
use crate::collectors::util::is_blank;
use serde::Deserialize;

/// Output columns requested from `bjobs -o`, in order.
pub const FIELDS: &str = "JOBID USER STAT QUEUE FROM_HOST EXEC_HOST JOB_NAME SUBMIT_TIME UGROUP PROJECT APPLICATION JOB_GROUP DEPENDENCY NALLOC_SLOT MIN_REQ_PROC START_TIME SUB_CWD PEND_TIME EPENDTIME IPENDTIME SRCJOBID DSTJOBID SRCLUSTER FWD_CLUSTER";

/// Label names shared by every job metric. The values come from [`Job::label_values`].
pub const LABELS: &[&str] = &[
    "job_id",
    "user",
    "status",
    "queue",
    "from_host",
    "exec_host",
    "job_name",
    "user_group",
    "project",
    "application",
    "solver",
    "job_group",
    "dependency",
    "nslot",
    "nproc",
    "start_time",
    "sub_cwd",
    "src_job_id",
    "dst_job_id",
    "src_cluster",
    "dst_cluster",
    "submit_time",
];

/// One `RECORDS` entry of `bjobs -json`. LSF prints most values as strings
/// but some versions emit bare numbers, so every field goes through the
/// lenient text deserializer.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Job {
    #[serde(rename = "JOBID", deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(rename = "USER", deserialize_with = "lenient::string")]
    pub user: String,
    #[serde(rename = "STAT", deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(rename = "QUEUE", deserialize_with = "lenient::string")]
    pub queue: String,
    #[serde(rename = "FROM_HOST", deserialize_with = "lenient::string")]
    pub from_host: String,
    #[serde(rename = "EXEC_HOST", deserialize_with = "lenient::string")]
    pub exec_host: String,
    #[serde(rename = "JOB_NAME", deserialize_with = "lenient::string")]
    pub job_name: String,
    #[serde(rename = "SUBMIT_TIME", deserialize_with = "lenient::string")]
    pub submit_time: String,
    #[serde(rename = "UGROUP", deserialize_with = "lenient::string")]
    pub user_group: String,
    #[serde(rename = "PROJ_NAME", deserialize_with = "lenient::string")]
    pub project: String,
    #[serde(rename = "APPLICATION", deserialize_with = "lenient::string")]
    pub application: String,
    #[serde(rename = "JOB_GROUP", deserialize_with = "lenient::string")]
    pub job_group: String,
    #[serde(rename = "DEPENDENCY", deserialize_with = "lenient::string")]
    pub dependency: String,
    #[serde(rename = "NALLOC_SLOT", deserialize_with = "lenient::string")]
    pub nslot: String,
    #[serde(rename = "MIN_REQ_PROC", deserialize_with = "lenient::string")]
    pub nproc: String,
    #[serde(rename = "START_TIME", deserialize_with = "lenient::string")]
    pub start_time: String,
    #[serde(rename = "SUB_CWD", deserialize_with = "lenient::string")]
    pub sub_cwd: String,
    #[serde(rename = "PEND_TIME", deserialize_with = "lenient::string")]
    pub pend_time: String,
    #[serde(rename = "EPENDTIME", deserialize_with = "lenient::string")]
    pub eligible_pend_time: String,
    #[serde(rename = "IPENDTIME", deserialize_with = "lenient::string")]
    pub ineligible_pend_time: String,
    #[serde(rename = "SRCJOBID", deserialize_with = "lenient::string")]
    pub src_job_id: String,
    #[serde(rename = "DSTJOBID", deserialize_with = "lenient::string")]
    pub dst_job_id: String,
    #[serde(rename = "SOURCE_CLUSTER", deserialize_with = "lenient::string")]
    pub src_cluster: String,
    #[serde(rename = "FORWARD_CLUSTER", deserialize_with = "lenient::string")]
    pub dst_cluster: String,
}

impl Job {
    /// Name looked up in the solver map: the application profile, else the queue.
    #[must_use]
    pub fn solver_key(&self) -> &str {
        if is_blank(&self.application) {
            &self.queue
        } else {
            &self.application
        }
    }

    /// Label values in [`LABELS`] order.
    #[must_use]
    pub fn label_values<'a>(&'a self, solver: &'a str) -> [&'a str; 22] {
        [
            self.id.as_str(),
            self.user.as_str(),
            self.status.as_str(),
            self.queue.as_str(),
            self.from_host.as_str(),
            self.exec_host.as_str(),
            self.job_name.as_str(),
            self.user_group.as_str(),
            self.project.as_str(),
            self.application.as_str(),
            solver,
            self.job_group.as_str(),
            self.dependency.as_str(),
            self.nslot.as_str(),
            self.nproc.as_str(),
            self.start_time.as_str(),
            self.sub_cwd.as_str(),
            self.src_job_id.as_str(),
            self.dst_job_id.as_str(),
            self.src_cluster.as_str(),
            self.dst_cluster.as_str(),
            self.submit_time.as_str(),
        ]
    }
}
